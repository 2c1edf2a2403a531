use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::job::JobConfig;

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum TaskStatus {
    NotReady,
    Init,
    Ongoing,
    Done,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// Nothing runnable right now; ask again later.
    Wait,
    /// The job is finished; the worker should stop.
    Exit,
    Map,
    Reduce,
}

/// What a worker needs to know about the job besides its tasks.
/// Paths are on a filesystem shared by coordinator and workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub config: JobConfig,
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Task {
    id: i32,
    input_files: Vec<String>,
    status: TaskStatus,
    task_type: TaskType,
    /// Reduce partition; unused by map tasks.
    partition: usize,
    worker_id: Option<i32>,
    attempts: u32,
    /// Map: one intermediate file per partition, in partition order.
    /// Reduce: the partition file.
    outputs: Vec<String>,
    error: Option<String>,
}

impl Task {
    pub fn new(id: i32, input_files: Vec<String>, task_type: TaskType) -> Task {
        Task {
            id,
            input_files,
            status: TaskStatus::Init,
            task_type,
            partition: 0,
            worker_id: None,
            attempts: 0,
            outputs: vec![],
            error: None,
        }
    }

    pub fn new_reduce_task(id: i32, partition: usize) -> Task {
        let mut task = Task::new(id, vec![], TaskType::Reduce);
        task.partition = partition;
        task.status = TaskStatus::NotReady;
        task
    }

    pub fn new_wait_task() -> Task {
        Task::new(0, vec![], TaskType::Wait) // 0 means not used
    }

    pub fn new_exit_task() -> Task {
        Task::new(0, vec![], TaskType::Exit)
    }

    pub fn add_input_files(&mut self, input_file: String) {
        self.input_files.push(input_file);
    }

    pub fn get_input_files(&self) -> &Vec<String> {
        &self.input_files
    }

    pub fn get_task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn get_task_status(&self) -> TaskStatus {
        self.status
    }

    pub fn get_partition(&self) -> usize {
        self.partition
    }

    pub fn get_worker_id(&self) -> Option<i32> {
        self.worker_id
    }

    /// Hands the task to a worker and counts the attempt.
    pub fn assign(&mut self, worker_id: i32) {
        self.worker_id = Some(worker_id);
        self.status = TaskStatus::Ongoing;
        self.attempts += 1;
    }

    pub fn get_attempts(&self) -> u32 {
        self.attempts
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub fn get_task_id(&self) -> i32 {
        self.id
    }

    pub fn get_task_outputs(&self) -> &Vec<String> {
        &self.outputs
    }

    pub fn complete(&mut self, outputs: Vec<String>) {
        self.outputs = outputs;
        self.error = None;
        self.status = TaskStatus::Done;
    }

    pub fn fail(&mut self, error: String) {
        self.error = Some(error);
        self.status = TaskStatus::Failed;
    }

    pub fn get_error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
