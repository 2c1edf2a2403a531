use futures::{future, lock::Mutex, prelude::*};
use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tarpc::{
    context,
    server::{self, Channel},
    tokio_serde::formats::Json,
};
use tokio::{sync::Notify, time::Duration};
use tracing::{debug, info, warn};

use crate::input::{list_input_files, slice_files};
use crate::job::JobConfig;
use crate::output::{mark_success, prepare_output_dir};
use crate::task::{JobSpec, Task, TaskStatus, TaskType};

/// A failed task is handed out again until it has been attempted this often.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct Coordinator {
    files: Vec<String>, // input files
    n_map: usize,       // requested number of map tasks
    spec: JobSpec,
    tasks: Vec<Task>,
    worker_ids: Vec<i32>,
    map_completed: usize,
    reduce_completed: usize,
    failure: Option<String>,
}

impl Coordinator {
    pub fn new(files: Vec<String>, n_map: usize, spec: JobSpec) -> Self {
        Coordinator {
            files,
            n_map,
            spec,
            tasks: vec![],
            worker_ids: vec![],
            map_completed: 0,
            reduce_completed: 0,
            failure: None,
        }
    }

    /// Builds a coordinator over every data file below `input`.
    pub fn from_input_dir(
        input: &Path,
        n_map: usize,
        config: JobConfig,
        work_dir: PathBuf,
        output_dir: PathBuf,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let files = list_input_files(input)?
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let spec = JobSpec {
            config,
            work_dir,
            output_dir,
        };
        Ok(Coordinator::new(files, n_map, spec))
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    fn n_reduce(&self) -> usize {
        self.spec.config.reducers
    }

    fn map_tasks(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.get_task_type() == TaskType::Map)
            .count()
    }

    // One map task per non-empty slice; files are dealt round-robin.
    fn slice(&mut self) {
        let paths: Vec<PathBuf> = self.files.iter().map(PathBuf::from).collect();
        for (i, split) in slice_files(&paths, self.n_map).into_iter().enumerate() {
            let input_files = split
                .into_iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            // ids [1, n_map] are map tasks
            self.tasks
                .push(Task::new(i as i32 + 1, input_files, TaskType::Map));
        }
    }

    fn add_reduce_tasks(&mut self) {
        let n_map = self.map_tasks() as i32;
        for partition in 0..self.n_reduce() {
            // ids (n_map, n_map + n_reduce] are reduce tasks
            self.tasks.push(Task::new_reduce_task(
                n_map + 1 + partition as i32,
                partition,
            ));
        }
        if n_map == 0 {
            self.release_reduce_tasks();
        }
    }

    /// Creates the task list and clean output/work directories.
    pub fn prepare(&mut self) -> anyhow::Result<()> {
        prepare_output_dir(&self.spec.output_dir)?;
        fs::create_dir_all(&self.spec.work_dir)?;
        self.slice();
        self.add_reduce_tasks();
        info!(
            files = self.files.len(),
            map_tasks = self.map_tasks(),
            reduce_tasks = self.n_reduce(),
            "job prepared"
        );
        Ok(())
    }

    fn release_reduce_tasks(&mut self) {
        for task in self.tasks.iter_mut() {
            if task.get_task_type() == TaskType::Reduce
                && task.get_task_status() == TaskStatus::NotReady
            {
                task.set_status(TaskStatus::Init);
            }
        }
    }

    pub fn register_worker(&mut self) -> i32 {
        let new_id = self.worker_ids.last().map_or(0, |v| v + 1);
        self.worker_ids.push(new_id);
        new_id
    }

    pub fn is_done(&self) -> bool {
        self.failure.is_some()
            || (self.reduce_completed == self.n_reduce() && !self.tasks.is_empty())
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Picks the next runnable task for worker `id`.
    pub fn assign_task(&mut self, id: i32) -> Task {
        if self.is_done() {
            return Task::new_exit_task();
        }
        if !self.worker_ids.contains(&id) {
            warn!(worker = id, "task requested by unknown worker");
            return Task::new_wait_task();
        }
        match self.tasks.iter_mut().find(|task| {
            task.get_task_status() == TaskStatus::Init
                || task.get_task_status() == TaskStatus::Failed
        }) {
            Some(task) => {
                task.assign(id);
                debug!(task = task.get_task_id(), worker = id, "assigned task");
                task.clone()
            }
            None => Task::new_wait_task(),
        }
    }

    /// Records a worker's report on a task. Reports on tasks that are not
    /// currently running are ignored, so a task's output is counted once.
    pub fn submit(&mut self, report: Task) {
        let Some(i) = self
            .tasks
            .iter()
            .position(|task| task.get_task_id() == report.get_task_id())
        else {
            warn!(task = report.get_task_id(), "report for unknown task");
            return;
        };
        if self.tasks[i].get_task_status() != TaskStatus::Ongoing
            || self.tasks[i].get_worker_id() != report.get_worker_id()
        {
            debug!(task = report.get_task_id(), "ignoring stale report");
            return;
        }

        if report.get_task_status() != TaskStatus::Done {
            let error = report.get_error().unwrap_or("unknown error").to_string();
            warn!(task = report.get_task_id(), attempts = self.tasks[i].get_attempts(), %error, "task failed");
            if self.tasks[i].get_attempts() >= MAX_ATTEMPTS {
                self.failure = Some(format!(
                    "task {} failed {} times: {}",
                    report.get_task_id(),
                    MAX_ATTEMPTS,
                    error
                ));
            }
            self.tasks[i].fail(error);
            return;
        }

        self.tasks[i].complete(report.get_task_outputs().clone());
        match self.tasks[i].get_task_type() {
            TaskType::Map => {
                for (partition, file) in report.get_task_outputs().iter().enumerate() {
                    if let Some(reduce) = self.tasks.iter_mut().find(|t| {
                        t.get_task_type() == TaskType::Reduce && t.get_partition() == partition
                    }) {
                        reduce.add_input_files(file.clone());
                    }
                }
                self.map_completed += 1;
                // reduce inputs are complete once every map task is done
                if self.map_completed == self.map_tasks() {
                    info!("map phase complete");
                    self.release_reduce_tasks();
                }
            }
            TaskType::Reduce => {
                self.reduce_completed += 1;
                if self.reduce_completed == self.n_reduce() {
                    info!("all tasks completed");
                }
            }
            _ => {}
        }
    }

    /// Marks the output complete and drops intermediate files.
    fn finish(&self) -> anyhow::Result<()> {
        if self.failure.is_some() {
            return Ok(());
        }
        mark_success(&self.spec.output_dir)?;
        if let Err(e) = fs::remove_dir_all(&self.spec.work_dir) {
            warn!(dir = %self.spec.work_dir.display(), "could not remove work dir: {}", e);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct CoordinatorServer {
    coordinator: Arc<Mutex<Coordinator>>,
    done: Arc<Notify>,
    socket_addr: Option<SocketAddr>,
}

impl CoordinatorServer {
    pub fn get_socket_addr(&self) -> Option<SocketAddr> {
        self.socket_addr
    }
}

impl crate::rpc::Rpc for CoordinatorServer {
    async fn register_worker(self, _: context::Context) -> i32 {
        let mut coordinator = self.coordinator.lock().await;
        let new_id = coordinator.register_worker();
        info!(worker = new_id, peer = ?self.get_socket_addr(), "registered worker");
        new_id
    }

    async fn job_spec(self, _: context::Context) -> JobSpec {
        self.coordinator.lock().await.spec().clone()
    }

    async fn request_task(self, _: context::Context, id: i32) -> Task {
        self.coordinator.lock().await.assign_task(id)
    }

    async fn submit(self, _: context::Context, task: Task) {
        let mut coordinator = self.coordinator.lock().await;
        coordinator.submit(task);
        if coordinator.is_done() {
            self.done.notify_one();
        }
    }
}

async fn spawn(fut: impl Future<Output = ()> + Send + 'static) {
    tokio::spawn(fut);
}

/// Serving options.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Maximum number of concurrently connected workers.
    pub max_workers: usize,
    /// How long to keep answering after the job finished, so polling workers
    /// learn that they can exit.
    pub linger: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        ServeOptions {
            max_workers: 10,
            linger: Duration::from_secs(2),
        }
    }
}

/// Prepares the job and serves it on `addr` until every task is done.
/// `on_listening` receives the bound address (useful with port 0).
pub async fn run(
    mut coordinator: Coordinator,
    addr: SocketAddr,
    options: ServeOptions,
    on_listening: impl FnOnce(SocketAddr),
) -> anyhow::Result<()> {
    coordinator.prepare()?;
    let already_done = coordinator.is_done();
    let coordinator = Arc::new(Mutex::new(coordinator));
    let done = Arc::new(Notify::new());
    if already_done {
        done.notify_one();
    }

    // JSON transport is provided by the json_transport tarpc module. It makes it easy
    // to start up a serde-powered json serialization strategy over TCP.
    let mut listener = tarpc::serde_transport::tcp::listen(&addr, Json::default).await?;
    info!("Listening on {}", listener.local_addr());
    listener.config_mut().max_frame_length(usize::MAX);
    on_listening(listener.local_addr());

    let server_future = listener
        // Ignore accept errors.
        .filter_map(|r| future::ready(r.ok()))
        .map(server::BaseChannel::with_defaults)
        .map(|channel| {
            let server = CoordinatorServer {
                coordinator: Arc::clone(&coordinator),
                done: Arc::clone(&done),
                socket_addr: channel.transport().peer_addr().ok(),
            };
            channel
                .execute(crate::rpc::Rpc::serve(server))
                .for_each(spawn)
        })
        .buffer_unordered(options.max_workers)
        .for_each(|_| async {});
    tokio::pin!(server_future);

    tokio::select! {
        _ = &mut server_future => {},
        _ = done.notified() => {
            let _ = tokio::time::timeout(options.linger, &mut server_future).await;
        },
    }

    let coordinator = coordinator.lock().await;
    coordinator.finish()?;
    match coordinator.failure() {
        Some(failure) => Err(anyhow::anyhow!("job failed: {}", failure)),
        None => Ok(()),
    }
}
