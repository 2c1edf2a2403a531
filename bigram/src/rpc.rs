use super::task::{JobSpec, Task};

#[tarpc::service]
pub trait Rpc {
    async fn register_worker() -> i32;
    async fn job_spec() -> JobSpec;
    async fn request_task(id: i32) -> Task;
    async fn submit(task: Task);
}
