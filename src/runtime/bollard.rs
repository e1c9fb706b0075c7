// ABOUTME: Bollard-based engine implementation for Docker and Podman.
// ABOUTME: JSON endpoints go through bollard, framed streams through raw HTTP on the socket.

use crate::runtime::error::{ConnectionSnafu, RuntimeError};
use crate::runtime::traits::{
    ContainerConfig, ContainerError, ContainerOps, ExecConfig, ExecError, ExecInfo, ExecOps,
    LogError, LogOps, LogOptions, NetworkConfig, NetworkError, NetworkOps, VolumeConfig,
    VolumeError, VolumeOps,
};
use crate::runtime::types::{RuntimeInfo, RuntimeType};
use crate::types::{ContainerId, ExecId, NetworkId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    ContainerCreateBody, EndpointSettings, HostConfig, Mount, MountTypeEnum, PortBinding,
};
use bollard::query_parameters::{
    CreateContainerOptions, RemoveContainerOptions, RemoveVolumeOptions, StopContainerOptions,
    WaitContainerOptions,
};
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::UnixStream;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::ImageNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ContainerError::AlreadyExists(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::AlreadyRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_stop_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::NotRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_network_create_error(e: bollard::errors::Error) -> NetworkError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => NetworkError::AlreadyExists(message.clone()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_volume_create_error(e: bollard::errors::Error) -> VolumeError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => VolumeError::AlreadyExists(message.clone()),
        _ => VolumeError::Runtime(e.to_string()),
    }
}

fn map_volume_remove_error(e: bollard::errors::Error) -> VolumeError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => VolumeError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => VolumeError::InUse(message.clone()),
        _ => VolumeError::Runtime(e.to_string()),
    }
}

fn map_exec_create_error(e: bollard::errors::Error) -> ExecError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ExecError::ContainerNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ExecError::ContainerNotRunning(message.clone()),
        _ => ExecError::Runtime(e.to_string()),
    }
}

fn map_exec_not_found_error(e: bollard::errors::Error) -> ExecError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ExecError::ExecNotFound(message.clone()),
        _ => ExecError::Runtime(e.to_string()),
    }
}

/// Error body returned by the engine API.
#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Best-effort extraction of the engine's error message from a response body.
fn api_error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ApiErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| format!("{}: {}", status, String::from_utf8_lossy(body).trim()))
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Engine implementation using bollard.
///
/// Supports both Docker and Podman via the Docker-compatible API. Exec output
/// and logs are fetched with plain HTTP requests on the same socket so the
/// caller receives the engine's framed byte stream untouched.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
    socket_path: String,
}

impl BollardRuntime {
    /// Connect to a container runtime using detected runtime info.
    ///
    /// Use with [`super::detect_local`] or [`super::detect`].
    pub fn connect(info: &RuntimeInfo) -> Result<Self, RuntimeError> {
        let client =
            Docker::connect_with_unix(&info.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .context(ConnectionSnafu {
                    socket: info.socket_path.clone(),
                })?;
        Ok(Self {
            client,
            runtime_type: info.runtime_type,
            socket_path: info.socket_path.clone(),
        })
    }

    /// Get the runtime type (Docker or Podman).
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    /// Ping the engine to check connectivity.
    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.client.ping().await.context(ConnectionSnafu {
            socket: self.socket_path.clone(),
        })?;
        Ok(())
    }

    /// Engine server version, as reported by the daemon.
    pub async fn server_version(&self) -> Result<String, RuntimeError> {
        let version = self.client.version().await.context(ConnectionSnafu {
            socket: self.socket_path.clone(),
        })?;
        Ok(version.version.unwrap_or_default())
    }

    /// Issue a raw HTTP request on the engine socket and collect the whole body.
    async fn raw_request(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(StatusCode, Bytes), String> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| format!("failed to connect to socket: {}", e))?;

        let io = TokioIo::new(stream);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| format!("HTTP handshake failed: {}", e))?;

        // Spawn connection handler
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!("engine connection error: {}", e);
            }
        });

        let payload = match body {
            Some(value) => serde_json::to_vec(&value)
                .map_err(|e| format!("failed to encode request: {}", e))?,
            None => Vec::new(),
        };

        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("Host", "localhost")
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| format!("failed to build request: {}", e))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| format!("failed to read response: {}", e))?
            .to_bytes();

        Ok((status, body))
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let mut host_config = HostConfig::default();

        let mounts: Vec<Mount> = config
            .volumes
            .iter()
            .map(|m| Mount {
                source: Some(m.source.clone()),
                target: Some(m.target.clone()),
                typ: Some(MountTypeEnum::VOLUME),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect();
        if !mounts.is_empty() {
            host_config.mounts = Some(mounts);
        }

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: Vec<String> = Vec::new();
        for port in &config.ports {
            let port_key = format!("{}/{}", port.container_port, port.protocol);
            exposed_ports.push(port_key.clone());
            port_bindings.insert(
                port_key,
                Some(vec![PortBinding {
                    host_ip: port.host_ip.clone(),
                    host_port: Some(port.host_port.to_string()),
                }]),
            );
        }
        if !port_bindings.is_empty() {
            host_config.port_bindings = Some(port_bindings);
        }

        if let Some(ref network) = config.network {
            host_config.network_mode = Some(network.clone());
        }

        let networking_config = config.network.as_ref().map(|network| {
            let mut endpoints: HashMap<String, EndpointSettings> = HashMap::new();
            endpoints.insert(network.clone(), EndpointSettings::default());
            bollard::models::NetworkingConfig {
                endpoints_config: Some(endpoints),
            }
        });

        let container_config = ContainerCreateBody {
            image: Some(config.image.clone()),
            env: if env.is_empty() { None } else { Some(env) },
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            cmd: config.command.clone(),
            working_dir: config.working_dir.clone(),
            tty: Some(false),
            host_config: Some(host_config),
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            networking_config,
            stop_timeout: config.stop_timeout.map(|d| d.as_secs() as i64),
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(config.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), container_config)
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        let opts = WaitContainerOptions {
            condition: "not-running".to_string(),
            ..Default::default()
        };

        let mut stream = self.client.wait_container(id.as_str(), Some(opts));
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error; the container still exited.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(map_container_not_found_error(e)),
            None => Err(ContainerError::Runtime(format!(
                "wait stream for {} ended without a result",
                id
            ))),
        }
    }
}

#[async_trait]
impl NetworkOps for BollardRuntime {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let opts = bollard::models::NetworkCreateRequest {
            name: config.name.clone(),
            driver: config.driver.clone(),
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            ..Default::default()
        };

        let response = self
            .client
            .create_network(opts)
            .await
            .map_err(map_network_create_error)?;

        Ok(NetworkId::new(response.id))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        match self
            .client
            .inspect_network(
                name,
                None::<bollard::query_parameters::InspectNetworkOptions>,
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(NetworkError::Runtime(e.to_string())),
        }
    }
}

#[async_trait]
impl VolumeOps for BollardRuntime {
    async fn create_volume(&self, config: &VolumeConfig) -> Result<(), VolumeError> {
        let opts = bollard::models::VolumeCreateRequest {
            name: Some(config.name.clone()),
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            ..Default::default()
        };

        self.client
            .create_volume(opts)
            .await
            .map_err(map_volume_create_error)?;

        Ok(())
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), VolumeError> {
        let opts = RemoveVolumeOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_volume(name, Some(opts))
            .await
            .map_err(map_volume_remove_error)
    }
}

#[async_trait]
impl ExecOps for BollardRuntime {
    async fn exec_create(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecId, ExecError> {
        let opts = bollard::models::ExecConfig {
            cmd: Some(config.cmd.clone()),
            env: if config.env.is_empty() {
                None
            } else {
                Some(config.env.clone())
            },
            working_dir: config.working_dir.clone(),
            attach_stdout: Some(config.attach_stdout),
            attach_stderr: Some(config.attach_stderr),
            tty: Some(config.tty),
            ..Default::default()
        };

        let response = self
            .client
            .create_exec(container.as_str(), opts)
            .await
            .map_err(map_exec_create_error)?;

        Ok(ExecId::new(response.id))
    }

    async fn exec_start(&self, exec_id: &ExecId) -> Result<Bytes, ExecError> {
        let uri = format!("/exec/{}/start", urlencoding::encode(exec_id.as_str()));
        let body = serde_json::json!({ "Detach": false, "Tty": false });

        let (status, bytes) = self
            .raw_request(Method::POST, &uri, Some(body))
            .await
            .map_err(ExecError::Runtime)?;

        match status.as_u16() {
            200..=299 => Ok(bytes),
            404 => Err(ExecError::ExecNotFound(api_error_message(status, &bytes))),
            409 => Err(ExecError::ContainerNotRunning(api_error_message(
                status, &bytes,
            ))),
            _ => Err(ExecError::Failed(api_error_message(status, &bytes))),
        }
    }

    async fn exec_inspect(&self, exec_id: &ExecId) -> Result<ExecInfo, ExecError> {
        let details = self
            .client
            .inspect_exec(exec_id.as_str())
            .await
            .map_err(map_exec_not_found_error)?;

        Ok(ExecInfo {
            running: details.running.unwrap_or(false),
            exit_code: details.exit_code,
        })
    }
}

#[async_trait]
impl LogOps for BollardRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<Bytes, LogError> {
        let tail = opts
            .tail
            .map(|n| n.to_string())
            .unwrap_or_else(|| "all".to_string());
        let uri = format!(
            "/containers/{}/logs?stdout={}&stderr={}&timestamps={}&tail={}",
            urlencoding::encode(id.as_str()),
            opts.stdout,
            opts.stderr,
            opts.timestamps,
            tail
        );

        let (status, bytes) = self
            .raw_request(Method::GET, &uri, None)
            .await
            .map_err(LogError::StreamError)?;

        match status.as_u16() {
            200..=299 => Ok(bytes),
            404 => Err(LogError::ContainerNotFound(api_error_message(status, &bytes))),
            _ => Err(LogError::Runtime(api_error_message(status, &bytes))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_prefers_json_message() {
        let body = br#"{"message":"No such exec instance: abc"}"#;
        assert_eq!(
            api_error_message(StatusCode::NOT_FOUND, body),
            "No such exec instance: abc"
        );
    }

    #[test]
    fn api_error_message_falls_back_to_raw_body() {
        let msg = api_error_message(StatusCode::INTERNAL_SERVER_ERROR, b"boom\n");
        assert!(msg.contains("500"));
        assert!(msg.ends_with("boom"));
    }
}
