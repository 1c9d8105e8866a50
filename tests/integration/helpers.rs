//! Test helpers: a local ECS metadata endpoint, cgroup trees and an
//! in-memory runtime.

use std::convert::Infallible;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming as IncomingBody;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use cgroup_runtime::runtime::{MemoryCeiling, RuntimeControl};
use cgroup_runtime::system::CgroupReader;

/// Path prefix the mock serves, mirroring a real v4 URI.
const METADATA_PATH: &str = "/v4/0123456789abcdef";

/// Canned reply for one endpoint.
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

#[allow(dead_code)]
impl Reply {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct Hits {
    container: AtomicUsize,
    task: AtomicUsize,
}

/// Local stand-in for the ECS task metadata endpoint.
pub struct MockEcs {
    uri: String,
    hits: Arc<Hits>,
    handle: JoinHandle<()>,
}

#[allow(dead_code)]
impl MockEcs {
    /// Serve `container` at `<uri>` and `task` at `<uri>/task`.
    pub async fn start(container: Reply, task: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock ECS endpoint");
        let addr = listener.local_addr().expect("Failed to get local addr");
        let hits = Arc::new(Hits::default());

        let server_hits = Arc::clone(&hits);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let hits = Arc::clone(&server_hits);
                let container = container.clone();
                let task = task.clone();

                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let hits = Arc::clone(&hits);
                        let container = container.clone();
                        let task = task.clone();
                        async move { respond(req, &hits, container, task).await }
                    });
                    let _ = http1::Builder::new().serve_connection(io, service).await;
                });
            }
        });

        Self {
            uri: format!("http://{}{}", addr, METADATA_PATH),
            hits,
            handle,
        }
    }

    /// Value for `ECS_CONTAINER_METADATA_URI_V4`.
    pub fn uri(&self) -> String {
        self.uri.clone()
    }

    pub fn container_hits(&self) -> usize {
        self.hits.container.load(Ordering::SeqCst)
    }

    pub fn task_hits(&self) -> usize {
        self.hits.task.load(Ordering::SeqCst)
    }
}

impl Drop for MockEcs {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn respond(
    req: Request<IncomingBody>,
    hits: &Hits,
    container: Reply,
    task: Reply,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();
    let reply = if path == METADATA_PATH {
        hits.container.fetch_add(1, Ordering::SeqCst);
        container
    } else if path == format!("{}/task", METADATA_PATH) {
        hits.task.fetch_add(1, Ordering::SeqCst);
        task
    } else {
        Reply::status(StatusCode::NOT_FOUND)
    };

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    Ok(Response::builder()
        .status(reply.status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(reply.body)))
        .unwrap())
}

/// Container response with the given CPU units.
#[allow(dead_code)]
pub fn container_json(docker_id: &str, cpu: f64) -> String {
    format!(
        r#"{{"DockerId":"{}","Name":"app","DockerName":"ecs-app-1","Limits":{{"CPU":{},"Memory":512}},"KnownStatus":"RUNNING"}}"#,
        docker_id, cpu
    )
}

/// cgroup v2 tree whose single group holds the given limit files.
pub struct CgroupTree {
    _dir: TempDir,
    group: PathBuf,
    reader: CgroupReader,
}

#[allow(dead_code)]
impl CgroupTree {
    pub fn new(cpu_max: &str, memory_max: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path().join("sys/fs/cgroup");
        let group = root.join("ecs/task/container");
        fs::create_dir_all(&group).unwrap();
        fs::write(root.join("cgroup.controllers"), "cpuset cpu io memory pids\n").unwrap();
        fs::write(group.join("cpu.max"), cpu_max).unwrap();
        fs::write(group.join("memory.max"), memory_max).unwrap();

        let proc_cgroup = dir.path().join("proc/self/cgroup");
        fs::create_dir_all(proc_cgroup.parent().unwrap()).unwrap();
        fs::write(&proc_cgroup, "0::/ecs/task/container\n").unwrap();

        Self {
            reader: CgroupReader::with_paths(root, proc_cgroup),
            group,
            _dir: dir,
        }
    }

    pub fn reader(&self) -> CgroupReader {
        self.reader.clone()
    }

    pub fn write(&self, file: &str, content: &str) {
        fs::write(self.group.join(file), content).unwrap();
    }
}

/// Runtime knobs held in memory, so tests never touch the process globals.
pub struct FakeRuntime {
    parallelism: Mutex<usize>,
    ceiling: Mutex<MemoryCeiling>,
}

impl FakeRuntime {
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: Mutex::new(parallelism),
            ceiling: Mutex::new(MemoryCeiling::NoLimit),
        }
    }
}

impl RuntimeControl for FakeRuntime {
    fn parallelism(&self) -> usize {
        *self.parallelism.lock().unwrap()
    }

    fn set_parallelism(&self, n: usize) -> usize {
        std::mem::replace(&mut *self.parallelism.lock().unwrap(), n)
    }

    fn memory_ceiling(&self) -> MemoryCeiling {
        *self.ceiling.lock().unwrap()
    }

    fn set_memory_ceiling(&self, ceiling: MemoryCeiling) -> MemoryCeiling {
        std::mem::replace(&mut *self.ceiling.lock().unwrap(), ceiling)
    }
}
