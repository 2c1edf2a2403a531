use crate::job::Job;
use crate::pair::CountRecord;
use crate::pipeline::{map_split, partition, reduce_partition};
use crate::rpc::RpcClient;
use crate::task::{JobSpec, Task, TaskType};
use crate::{input::read_lines, output::write_partition};
use anyhow::Context;
use rand::Rng;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tarpc::{client, context, tokio_serde::formats::Json};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Consecutive RPC failures after which the coordinator is considered gone.
const MAX_RPC_FAILURES: u32 = 5;

// Worker is the abstraction of a machine executing tasks
pub struct Worker {
    id: i32,
    coordinator: SocketAddr,
    client: Option<RpcClient>,
    spec: Option<JobSpec>,
    job: Option<Job>,
    poll_interval: Duration,
}

impl std::fmt::Display for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Worker {{ id: {}, coordinator: {}, connected: {} }}",
            self.id,
            self.coordinator,
            self.client.is_some()
        )
    }
}

impl Worker {
    pub fn new(coordinator: SocketAddr) -> Self {
        Worker {
            id: 0,
            coordinator,
            client: None,
            spec: None,
            job: None,
            poll_interval: Duration::from_millis(500),
        }
    }

    /// How long to sleep when there is no runnable task. Default 500ms.
    pub fn set_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.client.is_some() {
            // already have a client running
            return Ok(());
        }

        let mut transport = tarpc::serde_transport::tcp::connect(self.coordinator, Json::default);
        transport.config_mut().max_frame_length(usize::MAX);

        let client = RpcClient::new(client::Config::default(), transport.await?).spawn();
        self.client = Some(client);
        self.register().await?; // register to coordinator, obtain work_id
        info!(worker = self.id, "registered with coordinator");
        Ok(())
    }

    fn client(&self) -> anyhow::Result<&RpcClient> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Client not started"))
    }

    async fn register(&mut self) -> anyhow::Result<()> {
        let client = self.client()?;
        let id = client.register_worker(context::current()).await?;
        let spec = client.job_spec(context::current()).await?;
        let job = Job::new(spec.config.clone())?;
        self.id = id;
        self.spec = Some(spec);
        self.job = Some(job);
        Ok(())
    }

    async fn submit_task(&self, task: Task) -> anyhow::Result<()> {
        self.client()?.submit(context::current(), task).await?;
        Ok(())
    }

    fn job(&self) -> anyhow::Result<(&Job, &JobSpec)> {
        match (&self.job, &self.spec) {
            (Some(job), Some(spec)) => Ok((job, spec)),
            _ => Err(anyhow::anyhow!("Worker not registered")),
        }
    }

    // one map task: map and combine the split, then write one file per partition
    fn do_map(&self, task: &Task) -> anyhow::Result<Vec<String>> {
        let (job, spec) = self.job()?;
        let mut lines = vec![];
        for file in task.get_input_files() {
            lines.extend(read_lines(Path::new(file)).with_context(|| format!("reading {}", file))?);
        }
        let buckets = partition(job, map_split(job, lines));

        let mut outputs = vec![];
        for (p, bucket) in buckets.iter().enumerate() {
            let output = spec
                .work_dir
                .join(format!("mr-{}-{}.json", task.get_task_id(), p));
            save_result(bucket, &output)?;
            outputs.push(output.to_string_lossy().into_owned());
        }
        Ok(outputs)
    }

    // the input is every intermediate file of this partition, one per map task
    fn do_reduce(&self, task: &Task) -> anyhow::Result<String> {
        let (job, spec) = self.job()?;
        let mut records = vec![];
        for file in task.get_input_files() {
            records.extend(load_intermediate_result(file)?);
        }
        let out = reduce_partition(job, records)
            .with_context(|| format!("reducing partition {}", task.get_partition()))?;
        let path = write_partition(&spec.output_dir, task.get_partition(), &out)?;
        Ok(path.to_string_lossy().into_owned())
    }

    /// Runs one task. Returns false once the coordinator says the job is over.
    async fn do_task(&self, task: Task) -> anyhow::Result<bool> {
        debug!(worker = self.id, ?task, "got task");
        let mut task = task;
        let result = match task.get_task_type() {
            TaskType::Exit => return Ok(false),
            TaskType::Wait => {
                let jitter = rand::thread_rng().gen_range(0..=self.poll_interval.as_millis() as u64 / 2);
                sleep(self.poll_interval + Duration::from_millis(jitter)).await;
                return Ok(true);
            }
            TaskType::Map => self.do_map(&task),
            TaskType::Reduce => self.do_reduce(&task).map(|output| vec![output]),
        };
        match result {
            Ok(outputs) => {
                info!(worker = self.id, task = task.get_task_id(), "task done");
                task.complete(outputs);
            }
            Err(e) => {
                warn!(worker = self.id, task = task.get_task_id(), "task failed: {:#}", e);
                task.fail(format!("{:#}", e));
            }
        }
        self.submit_task(task).await?;
        Ok(true)
    }

    /// Asks for tasks until the job is finished.
    pub async fn run(&self) -> anyhow::Result<()> {
        let client = self.client()?;
        let mut failures = 0;
        loop {
            match client.request_task(context::current(), self.id).await {
                Ok(task) => {
                    failures = 0;
                    if !self.do_task(task).await? {
                        info!(worker = self.id, "job finished, exiting");
                        return Ok(());
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(worker = self.id, failures, "requesting task failed: {}", e);
                    if failures >= MAX_RPC_FAILURES {
                        return Err(anyhow::anyhow!("lost coordinator: {}", e));
                    }
                    sleep(self.poll_interval).await;
                }
            }
        }
    }
}

fn save_result(result: &[CountRecord], path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let serialized = serde_json::to_string(result)?;
    Ok(fs::write(path, serialized)?)
}

fn load_intermediate_result(path: &str) -> anyhow::Result<Vec<CountRecord>> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let result: Vec<CountRecord> = serde_json::from_str(&contents)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobConfig;
    use crate::pair::PairKey;

    fn worker_for(dir: &Path, reducers: usize) -> Worker {
        let config = JobConfig::default().set_reducers(reducers);
        let mut worker = Worker::new("127.0.0.1:1".parse().unwrap());
        worker.id = 1;
        worker.job = Some(Job::new(config.clone()).unwrap());
        worker.spec = Some(JobSpec {
            config,
            work_dir: dir.join("work"),
            output_dir: dir.join("out"),
        });
        worker
    }

    #[test]
    fn test_intermediate_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/mr-1-0.json");
        let records = vec![(PairKey::marginal("a"), 2), (PairKey::new("a", "b"), 2)];
        save_result(&records, &path).unwrap();
        assert_eq!(
            load_intermediate_result(path.to_str().unwrap()).unwrap(),
            records
        );
    }

    #[test]
    fn test_worker_do_map_then_reduce() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "the cat sat\nthe cat ran\n").unwrap();
        fs::create_dir_all(dir.path().join("out")).unwrap();
        let worker = worker_for(dir.path(), 2);

        let task = Task::new(1, vec![input.to_string_lossy().into_owned()], TaskType::Map);
        let outputs = worker.do_map(&task).unwrap();
        assert_eq!(outputs.len(), 2);

        let mut lines = vec![];
        for (p, file) in outputs.into_iter().enumerate() {
            let mut reduce = Task::new_reduce_task(2 + p as i32, p);
            reduce.add_input_files(file);
            let out = worker.do_reduce(&reduce).unwrap();
            lines.extend(
                fs::read_to_string(out)
                    .unwrap()
                    .lines()
                    .map(|l| l.to_string())
                    .collect::<Vec<_>>(),
            );
        }
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "cat\t\t2",
                "cat\tran\t0.5",
                "cat\tsat\t0.5",
                "the\t\t2",
                "the\tcat\t1.0",
            ]
        );
    }

    #[test]
    fn test_worker_do_map_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let worker = worker_for(dir.path(), 1);
        let task = Task::new(1, vec!["/definitely/not/here.txt".to_string()], TaskType::Map);
        let err = worker.do_map(&task).unwrap_err();
        assert!(format!("{:#}", err).contains("reading /definitely/not/here.txt"));
    }
}
