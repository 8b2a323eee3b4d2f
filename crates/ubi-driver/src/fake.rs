//! In-memory provider used by the driver tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::BoxError;
use crate::client::{ClientFactory, Credentials, InstanceDetails, InstanceRequest, ProviderClient};

pub const SERVICE_ID: i64 = 9001;
pub const KEY_ID: i64 = 55;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AddKey { name: String, public_key: String },
    RemoveKey(i64),
    CreateInstance(InstanceRequest),
    GetInstance(i64),
    Start(i64),
    Stop(i64),
    Reboot(i64),
    Destroy(i64),
}

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    queries: VecDeque<Result<Option<String>, String>>,
    status: String,
    credentials: Option<Credentials>,
    fail_add_key: bool,
    fail_create: bool,
    fail_remove_key: bool,
    fail_destroy: bool,
    fail_power: Option<String>,
    cancel_on_add_key: Option<CancellationToken>,
}

#[derive(Default)]
pub struct FakeProvider {
    inner: Mutex<Inner>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        let provider = Self::default();
        provider.lock().status = "online".into();
        Arc::new(provider)
    }

    pub fn factory(self: &Arc<Self>) -> Arc<dyn ClientFactory> {
        Arc::new(FakeFactory {
            provider: Arc::clone(self),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Responses for successive `get_instance` calls: `Ok(address)` or
    /// `Err(message)`. Once drained, queries succeed with no address.
    pub fn script_queries<const N: usize>(&self, script: [Result<Option<&str>, &str>; N]) {
        self.lock().queries.extend(
            script
                .into_iter()
                .map(|r| r.map(|a| a.map(str::to_string)).map_err(str::to_string)),
        );
    }

    pub fn set_status(&self, status: &str) {
        self.lock().status = status.to_string();
    }

    pub fn fail_add_key(&self) {
        self.lock().fail_add_key = true;
    }

    pub fn fail_create(&self) {
        self.lock().fail_create = true;
    }

    pub fn fail_remove_key(&self) {
        self.lock().fail_remove_key = true;
    }

    pub fn fail_destroy(&self) {
        self.lock().fail_destroy = true;
    }

    pub fn fail_power(&self, message: &str) {
        self.lock().fail_power = Some(message.to_string());
    }

    /// Fire `cancel` while the key is being registered.
    pub fn cancel_on_add_key(&self, cancel: CancellationToken) {
        self.lock().cancel_on_add_key = Some(cancel);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn last_credentials(&self) -> Option<Credentials> {
        self.lock().credentials.clone()
    }

    fn record(&self, call: Call) {
        self.lock().calls.push(call);
    }

    fn outcome(failed: bool, what: &str) -> Result<(), BoxError> {
        if failed {
            Err(format!("{what} failed").into())
        } else {
            Ok(())
        }
    }

    fn power(&self, call: Call) -> Result<(), BoxError> {
        self.record(call);
        match &self.lock().fail_power {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    async fn create_instance(&self, req: &InstanceRequest) -> Result<i64, BoxError> {
        self.record(Call::CreateInstance(req.clone()));
        Self::outcome(self.lock().fail_create, "create instance")?;
        Ok(SERVICE_ID)
    }

    async fn get_instance(&self, service_id: i64) -> Result<InstanceDetails, BoxError> {
        self.record(Call::GetInstance(service_id));
        let mut inner = self.lock();
        let status = inner.status.clone();
        match inner.queries.pop_front() {
            Some(Err(message)) => Err(message.into()),
            Some(Ok(address)) => Ok(InstanceDetails { status, address }),
            None => Ok(InstanceDetails {
                status,
                address: None,
            }),
        }
    }

    async fn start_instance(&self, service_id: i64) -> Result<(), BoxError> {
        self.power(Call::Start(service_id))
    }

    async fn stop_instance(&self, service_id: i64) -> Result<(), BoxError> {
        self.power(Call::Stop(service_id))
    }

    async fn reboot_instance(&self, service_id: i64) -> Result<(), BoxError> {
        self.power(Call::Reboot(service_id))
    }

    async fn destroy_instance(&self, service_id: i64) -> Result<(), BoxError> {
        self.record(Call::Destroy(service_id));
        Self::outcome(self.lock().fail_destroy, "destroy instance")
    }

    async fn add_key(&self, name: &str, public_key: &str) -> Result<i64, BoxError> {
        self.record(Call::AddKey {
            name: name.to_string(),
            public_key: public_key.to_string(),
        });
        if let Some(cancel) = &self.lock().cancel_on_add_key {
            cancel.cancel();
        }
        Self::outcome(self.lock().fail_add_key, "add key")?;
        Ok(KEY_ID)
    }

    async fn remove_key(&self, key_id: i64) -> Result<(), BoxError> {
        self.record(Call::RemoveKey(key_id));
        Self::outcome(self.lock().fail_remove_key, "remove key")
    }
}

struct FakeFactory {
    provider: Arc<FakeProvider>,
}

impl ClientFactory for FakeFactory {
    fn build(&self, credentials: &Credentials) -> Arc<dyn ProviderClient> {
        self.provider.lock().credentials = Some(credentials.clone());
        self.provider.clone()
    }
}
