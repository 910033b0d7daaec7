// SQLite schema for the seven relations, applied statement by statement at startup

pub const CREATE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id BLOB PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        full_name TEXT,
        role TEXT NOT NULL CHECK (role IN ('student', 'teacher', 'principal', 'admin')),
        avatar_url TEXT,
        instagram TEXT,
        tiktok TEXT,
        reputation INTEGER NOT NULL DEFAULT 0,
        join_date TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ideas (
        id BLOB PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        author_id BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        category TEXT NOT NULL,
        votes INTEGER NOT NULL DEFAULT 0,
        comment_count INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL
            CHECK (status IN ('new', 'under-review', 'forwarded', 'approved', 'rejected')),
        teacher_notes TEXT,
        reviewed_by BLOB REFERENCES profiles(id) ON DELETE SET NULL,
        forwarded_date TEXT,
        principal_status TEXT CHECK (principal_status IS NULL OR principal_status IN
            ('pending', 'in-progress', 'approved', 'rejected', 'implemented')),
        principal_notes TEXT,
        budget REAL CHECK (budget IS NULL OR budget >= 0),
        priority TEXT CHECK (priority IS NULL OR priority IN ('low', 'medium', 'high', 'urgent')),
        implementation_date TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ideas_status ON ideas(status)",
    "CREATE INDEX IF NOT EXISTS idx_ideas_created ON ideas(created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS votes (
        id BLOB PRIMARY KEY,
        user_id BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        idea_id BLOB NOT NULL REFERENCES ideas(id) ON DELETE CASCADE,
        vote_type TEXT NOT NULL CHECK (vote_type IN ('up', 'down')),
        created_at TEXT NOT NULL,
        UNIQUE (user_id, idea_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_votes_idea ON votes(idea_id)",
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id BLOB PRIMARY KEY,
        idea_id BLOB NOT NULL REFERENCES ideas(id) ON DELETE CASCADE,
        author_id BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        parent_id BLOB REFERENCES comments(id) ON DELETE CASCADE,
        votes INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_comments_idea ON comments(idea_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS comment_votes (
        id BLOB PRIMARY KEY,
        user_id BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        comment_id BLOB NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
        vote_type TEXT NOT NULL CHECK (vote_type IN ('up', 'down')),
        created_at TEXT NOT NULL,
        UNIQUE (user_id, comment_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_comment_votes_comment ON comment_votes(comment_id)",
    r#"
    CREATE TABLE IF NOT EXISTS friends (
        id BLOB PRIMARY KEY,
        user_id BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        friend_id BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        status TEXT NOT NULL CHECK (status IN ('pending', 'accepted', 'blocked')),
        created_at TEXT NOT NULL,
        UNIQUE (user_id, friend_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_friends_friend ON friends(friend_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id BLOB PRIMARY KEY,
        sender_id BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        recipient_id BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        read INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_messages_pair ON messages(sender_id, recipient_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages(recipient_id, read)",
];
