mod job_repo;
mod session_repo;

pub use job_repo::JobRepo;
pub use session_repo::SessionRepo;
