// Background tailoring jobs: the job store, the bounded worker queue, the
// pipeline each worker runs, and the HTTP handlers over them.

pub mod handlers;
pub mod manager;
pub mod models;
pub mod pipeline;
pub mod queue;
