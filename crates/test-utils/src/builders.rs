use std::path::Path;

use serde_json::{Map, Value, json};

/// Builder for a single job object, as written in the configuration
/// document or a `*.job` file.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    job: Map<String, Value>,
}

impl JobBuilder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let mut job = Map::new();
        job.insert(
            "path".into(),
            Value::String(path.as_ref().to_string_lossy().into_owned()),
        );
        Self { job }
    }

    pub fn command(mut self, command: &str) -> Self {
        self.job.insert("command".into(), json!(command));
        self
    }

    pub fn events(mut self, names: &[&str]) -> Self {
        self.job.insert("inotify".into(), json!(names));
        self
    }

    pub fn owner(mut self, owner: &str) -> Self {
        self.job.insert("owner".into(), json!(owner));
        self
    }

    pub fn recursive(mut self) -> Self {
        self.job.insert("recursive".into(), json!(true));
        self
    }

    pub fn escaped(mut self) -> Self {
        self.job.insert("escaped".into(), json!(true));
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.job)
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.job.clone()).to_string()
    }
}

/// Builder for the configuration document.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    debug: bool,
    jobs: Vec<Value>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn job(mut self, job: JobBuilder) -> Self {
        self.jobs.push(job.build());
        self
    }

    /// Add an arbitrary (possibly malformed) job record.
    pub fn raw_job(mut self, value: Value) -> Self {
        self.jobs.push(value);
        self
    }

    pub fn to_json(&self) -> String {
        json!({ "debug": self.debug, "jobs": self.jobs }).to_string()
    }
}
