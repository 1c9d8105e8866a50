//! ECS task metadata (v4) response structures.
//!
//! Only the fields used for CPU discovery are modelled; everything else in
//! the payload is ignored.

use serde::Deserialize;

/// `Limits` object of a container or task.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Limits {
    /// CPU units (1024 = one vCPU). Missing means no explicit limit.
    #[serde(rename = "CPU", default)]
    pub cpu: Option<f64>,
    /// Memory in MiB.
    #[serde(rename = "Memory", default)]
    pub memory: Option<u64>,
}

/// Response of `GET ${ECS_CONTAINER_METADATA_URI_V4}`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ContainerMetadata {
    #[serde(rename = "DockerId", alias = "DockerID", default)]
    pub docker_id: Option<String>,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Limits", default)]
    pub limits: Option<Limits>,
}

impl ContainerMetadata {
    /// CPU units, with zero standing in for "not reported".
    pub fn cpu_units(&self) -> f64 {
        cpu_units(self.limits.as_ref())
    }
}

/// Response of `GET ${ECS_CONTAINER_METADATA_URI_V4}/task`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TaskMetadata {
    #[serde(rename = "TaskARN", default)]
    pub task_arn: Option<String>,
    #[serde(rename = "Limits", default)]
    pub limits: Option<Limits>,
    #[serde(rename = "Containers", default)]
    pub containers: Vec<ContainerMetadata>,
}

impl TaskMetadata {
    /// CPU units for this task as seen from `docker_id`.
    ///
    /// The matching container entry wins when it reports a limit; otherwise
    /// the task-wide limit applies.
    pub fn cpu_units_for(&self, docker_id: Option<&str>) -> f64 {
        let container_units = docker_id
            .and_then(|id| {
                self.containers
                    .iter()
                    .find(|c| c.docker_id.as_deref() == Some(id))
            })
            .map(ContainerMetadata::cpu_units)
            .unwrap_or(0.0);

        if container_units > 0.0 {
            container_units
        } else {
            cpu_units(self.limits.as_ref())
        }
    }
}

fn cpu_units(limits: Option<&Limits>) -> f64 {
    limits
        .and_then(|l| l.cpu)
        .filter(|cpu| cpu.is_finite() && *cpu > 0.0)
        .unwrap_or(0.0)
}
