mod command_pool;
mod timeline_semaphore;

pub use self::{
    command_pool::CommandPool, timeline_semaphore::TimelineSemaphore,
};
