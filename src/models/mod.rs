pub mod comment;
pub mod file;
pub mod task;
pub mod user;

pub use comment::{Comment, CommentInput, CommentUpdate};
pub use file::{FileRecord, ALLOWED_MIME_TYPES, MAX_FILE_SIZE};
pub use task::{
    BulkCreateRequest, BulkError, BulkTaskInput, Task, TaskInput, TaskPriority, TaskQuery,
    TaskStatus, TaskUpdate,
};
pub use user::{Role, User};
