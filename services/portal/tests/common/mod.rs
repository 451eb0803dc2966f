//! Shared fixtures for the portal integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use pcas_core::domain::ServerEnvelope;
use pcas_core::ports::{ApiGateway, HttpMethod, LocalCache, PortError, PortResult};
use portal_lib::adapters::MemoryCache;
use portal_lib::config::Config;
use portal_lib::persistence;
use portal_lib::store::Portal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

/// A gateway answering from a script keyed by method and path.
/// Unscripted requests fail with a 404.
#[derive(Default)]
pub struct StubGateway {
    responses: Mutex<HashMap<(HttpMethod, String), PortResult<ServerEnvelope>>>,
    calls: Mutex<Vec<RecordedCall>>,
    healthy: Mutex<bool>,
}

impl StubGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: HttpMethod, path: &str, data: Value) {
        self.script(method, path, Ok(ServerEnvelope::ok(data)));
    }

    pub fn fail(&self, method: HttpMethod, path: &str, error: PortError) {
        self.script(method, path, Err(error));
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock().expect("healthy lock") = healthy;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls().iter().filter(|c| c.path == path).count()
    }

    fn script(&self, method: HttpMethod, path: &str, result: PortResult<ServerEnvelope>) {
        self.responses
            .lock()
            .expect("responses lock")
            .insert((method, path.to_string()), result);
    }
}

#[async_trait]
impl ApiGateway for StubGateway {
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> PortResult<ServerEnvelope> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });
        self.responses
            .lock()
            .expect("responses lock")
            .get(&(method, path.to_string()))
            .cloned()
            .unwrap_or_else(|| {
                Err(PortError::Rejected {
                    status: 404,
                    message: format!("no route for {} {}", method.as_str(), path),
                })
            })
    }

    async fn health(&self) -> PortResult<()> {
        if *self.healthy.lock().expect("healthy lock") {
            Ok(())
        } else {
            Err(PortError::network())
        }
    }
}

pub struct Harness {
    pub gateway: Arc<StubGateway>,
    pub cache: Arc<MemoryCache>,
    pub portal: Portal,
}

pub fn default_config() -> Config {
    Config::from_lookup(|_| None).expect("defaults should be valid")
}

pub fn harness() -> Harness {
    harness_with(default_config())
}

pub fn harness_with(config: Config) -> Harness {
    let gateway = StubGateway::new();
    let cache = Arc::new(MemoryCache::new());
    let portal = Portal::with_adapters(gateway.clone(), cache.clone(), config);
    Harness {
        gateway,
        cache,
        portal,
    }
}

pub fn user_json(id: &str) -> Value {
    json!({
        "id": id,
        "email": "a@b.com",
        "fullName": "Ayesha Noor Khan",
        "dob": "2006-04-01T00:00:00.000Z",
        "phone": "03001234567",
        "address": "House 12, Street 4, Lahore",
        "role": "undergraduate",
        "isEmailVerified": true,
        "isPhoneVerified": false,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    })
}

pub fn education_json() -> Value {
    json!({
        "id": "e1",
        "userId": "u1",
        "matricGrades": "A+",
        "matricPicName": "matric.png",
        "fscGrades": "A",
        "fscPicName": "fsc.png",
        "collegeName": "Government College",
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    })
}

pub fn family_json() -> Value {
    json!({
        "id": "f1",
        "userId": "u1",
        "fatherName": "Ali",
        "motherName": "Sara",
        "fatherOccupation": "govt",
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    })
}

/// Signs in as `u1` through the scripted login route.
pub async fn sign_in(h: &Harness) {
    h.gateway.respond(
        HttpMethod::Post,
        "/api/auth/login",
        json!({ "user": user_json("u1"), "token": "T1" }),
    );
    h.portal
        .session
        .login(&pcas_core::domain::LoginRequest {
            email: "a@b.com".to_string(),
            password: "x".to_string(),
        })
        .await
        .expect("scripted login should succeed");
}

pub fn token(cache: &dyn LocalCache) -> Option<String> {
    persistence::load_token(cache)
}
