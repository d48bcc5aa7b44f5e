//! Recording collaborators for tests

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use libstatebench_core::store::StateStore;
use libstatebench_core::types::{DataPointMeta, InstanceIndex, InstanceSettings, ResourceSample};
use libstatebench_core::{MemoryStore, StatebenchError};
use libstatebench_ipc::{ControlCommand, ControlResponse, IpcError, Messenger};

use super::lifecycle::InstanceControl;
use crate::error::{BenchError, Result};

/// Store call as seen by `RecordingStore`
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    CreateDataPoint(String),
    DeleteDataPoint(String),
    WriteValue(String, f64, bool),
    DeleteValue(String),
}

/// Memory store that logs every call and can fail one named operation
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<Vec<StoreCall>>,
    fail_on: Mutex<Option<StoreCall>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first call equal to `call`
    pub fn fail_on(&self, call: StoreCall) {
        *self.fail_on.lock().unwrap() = Some(call);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn log(&self, call: StoreCall) -> libstatebench_core::Result<()> {
        let mut fail_on = self.fail_on.lock().unwrap();
        if fail_on.as_ref() == Some(&call) {
            *fail_on = None;
            return Err(StatebenchError::Internal(format!(
                "injected failure: {:?}",
                call
            )));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl StateStore for RecordingStore {
    async fn create_data_point(
        &self,
        name: &str,
        meta: &DataPointMeta,
    ) -> libstatebench_core::Result<()> {
        self.log(StoreCall::CreateDataPoint(name.to_string()))?;
        self.inner.create_data_point(name, meta).await
    }

    async fn delete_data_point(&self, name: &str) -> libstatebench_core::Result<()> {
        self.log(StoreCall::DeleteDataPoint(name.to_string()))?;
        self.inner.delete_data_point(name).await
    }

    async fn write_value(
        &self,
        name: &str,
        value: f64,
        ack: bool,
    ) -> libstatebench_core::Result<()> {
        self.log(StoreCall::WriteValue(name.to_string(), value, ack))?;
        self.inner.write_value(name, value, ack).await
    }

    async fn delete_value(&self, name: &str) -> libstatebench_core::Result<()> {
        self.log(StoreCall::DeleteValue(name.to_string()))?;
        self.inner.delete_value(name).await
    }

    async fn data_point_count(&self) -> libstatebench_core::Result<usize> {
        self.inner.data_point_count().await
    }

    async fn value_count(&self) -> libstatebench_core::Result<usize> {
        self.inner.value_count().await
    }
}

/// Messenger that acknowledges everything except one command, which times out
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(InstanceIndex, ControlCommand)>>,
    times_out_on: Option<ControlCommand>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timing_out_on(command: ControlCommand) -> Self {
        Self {
            times_out_on: Some(command),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(InstanceIndex, ControlCommand)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_to_instance(
        &self,
        target: InstanceIndex,
        command: ControlCommand,
    ) -> std::result::Result<ControlResponse, IpcError> {
        self.sent.lock().unwrap().push((target, command));
        if self.times_out_on == Some(command) {
            return Err(IpcError::Timeout(50));
        }
        let request_id = format!("req-{}", self.sent.lock().unwrap().len());
        if command == ControlCommand::StopMeasuring {
            let sample = ResourceSample {
                ts_unix_ms: 1,
                cpu_percent: 10.0,
                memory_bytes: 2048,
                event_loop_lag_ms: 0.5,
            };
            return ControlResponse::with_samples(request_id, &[sample]);
        }
        Ok(ControlResponse::success(request_id, None))
    }
}

/// Instance control call as seen by `RecordingControl`
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCall {
    Create(InstanceIndex, bool, Option<String>),
    Update(InstanceIndex, InstanceSettings),
    Check(InstanceIndex),
    Delete(InstanceIndex),
}

#[derive(Default)]
pub struct RecordingControl {
    calls: Mutex<Vec<ControlCall>>,
    fail_on: Mutex<HashSet<String>>,
}

impl RecordingControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail calls whose debug form starts with `prefix`, e.g. `Update(2`
    pub fn fail_on(&self, prefix: &str) {
        self.fail_on.lock().unwrap().insert(prefix.to_string());
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, index: InstanceIndex, call: ControlCall) -> Result<()> {
        let rendered = format!("{:?}", call);
        if self
            .fail_on
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| rendered.starts_with(prefix.as_str()))
        {
            return Err(BenchError::Instance {
                index,
                message: format!("injected failure: {}", rendered),
            });
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl InstanceControl for RecordingControl {
    async fn create_instance(
        &self,
        index: InstanceIndex,
        enabled: bool,
        host: Option<&str>,
    ) -> Result<()> {
        self.log(
            index,
            ControlCall::Create(index, enabled, host.map(str::to_string)),
        )
    }

    async fn update_instance_config(
        &self,
        index: InstanceIndex,
        settings: InstanceSettings,
    ) -> Result<()> {
        self.log(index, ControlCall::Update(index, settings))
    }

    async fn check_instance(&self, index: InstanceIndex) -> Result<()> {
        self.log(index, ControlCall::Check(index))
    }

    async fn delete_instance(&self, index: InstanceIndex) -> Result<()> {
        self.log(index, ControlCall::Delete(index))
    }
}
