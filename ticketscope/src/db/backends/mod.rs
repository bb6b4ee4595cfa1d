pub mod libsql;
pub mod lru;
