//! Proxy process lifecycle
//!
//! `start()` performs naming lookup, root registration, listener and
//! name publication; `run()` serves intercepted calls until the admin
//! channel signals EXIT; `stop()` retracts the published name.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::admin::{AdminChannel, ShutdownSignal};
use crate::config::{ProxyConfig, RecorderConfig};
use crate::error::{Result, RpcTapError};
use crate::hook::{run_bind_hook, BindContext, BindHook};
use crate::naming::{NameService, StaticNameService};
use crate::proxy::interceptor::Interceptor;
use crate::proxy::registry::{ReferenceRegistry, RemoteRef};
use crate::proxy::upstream::{TcpUpstream, Upstream};
use crate::record::{LogRecorder, MethodRecorder, NullRecorder, ScriptRecorder};
use crate::wire::{RpcFault, RpcRequest, RpcResponse, RequestId};

/// The interception proxy process.
pub struct ProxyServer {
    config: ProxyConfig,
    registry: Arc<ReferenceRegistry>,
    recorder: Arc<dyn MethodRecorder>,
    naming: Arc<dyn NameService>,
    upstream: Option<Arc<dyn Upstream>>,
    hook: Option<Box<dyn BindHook>>,

    listener: Option<TcpListener>,
    admin: Option<AdminChannel>,
    shutdown: Option<ShutdownSignal>,
    listen_addr: Option<SocketAddr>,
}

impl ProxyServer {
    pub fn builder(config: ProxyConfig) -> ProxyServerBuilder {
        ProxyServerBuilder::new(config)
    }

    /// Address the proxy is actually listening on (after `start`).
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen_addr
    }

    pub fn registry(&self) -> &Arc<ReferenceRegistry> {
        &self.registry
    }

    /// Set up the proxy: resolve the target, register the root,
    /// bind listeners, publish the proxy's name, run the bind hook.
    ///
    /// Any failure here aborts startup.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("Setting up proxy for {}", self.config.target_name);

        // Locate the real target. When an upstream was injected the
        // lookup is already done.
        let target_addr = match &self.upstream {
            Some(_) => None,
            None => {
                let addr = self.naming.lookup(&self.config.target_name).await?;
                self.upstream = Some(Arc::new(TcpUpstream::new(addr)));
                Some(addr)
            }
        };

        self.registry
            .register_root(RemoteRef::root(&self.config.target_name))
            .await;

        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(|e| {
                RpcTapError::Setup(format!("bind {}: {e}", self.config.listen_addr))
            })?;
        let listen_addr = listener.local_addr()?;
        self.listener = Some(listener);
        self.listen_addr = Some(listen_addr);

        let (admin, shutdown) = AdminChannel::bind(self.config.admin_addr).await?;
        self.admin = Some(admin);
        self.shutdown = Some(shutdown);

        // Publish ourselves under the target's public name.
        self.naming
            .bind(&self.config.target_name, listen_addr)
            .await?;

        let ctx = BindContext {
            target: target_addr.unwrap_or(listen_addr),
            proxy_name: self.config.target_name.clone(),
            listen_addr,
        };
        run_bind_hook(self.hook.as_deref(), &ctx);

        tracing::info!(
            "Proxy for {} listening on {listen_addr}",
            self.config.target_name
        );
        Ok(())
    }

    /// Serve intercepted calls until the admin channel signals EXIT.
    pub async fn run(&mut self) -> Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| RpcTapError::Setup("run() before start()".to_string()))?;
        let admin = self
            .admin
            .take()
            .ok_or_else(|| RpcTapError::Setup("run() before start()".to_string()))?;
        let mut shutdown = self
            .shutdown
            .take()
            .ok_or_else(|| RpcTapError::Setup("run() before start()".to_string()))?;

        let upstream = self
            .upstream
            .clone()
            .ok_or_else(|| RpcTapError::Setup("no upstream configured".to_string()))?;
        let interceptor = Arc::new(Interceptor::new(
            upstream,
            Arc::clone(&self.registry),
            Arc::clone(&self.recorder),
        ));

        tokio::spawn(admin.run());

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Shutdown requested, leaving serve loop");
                        break;
                    }
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let interceptor = Arc::clone(&interceptor);
                            tokio::spawn(async move {
                                if let Err(e) = serve_connection(stream, interceptor).await {
                                    tracing::warn!("Connection from {peer} ended with error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept failed: {e}");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Retract the published name. Failures are logged, not fatal.
    pub async fn stop(&mut self) {
        if let Err(e) = self.naming.unbind(&self.config.target_name).await {
            tracing::warn!("Failed to unbind proxy name: {e}");
        }
        self.listener = None;
        self.listen_addr = None;
        tracing::info!("Proxy for {} stopped", self.config.target_name);
    }

    /// Full lifecycle: start, serve until EXIT, stop.
    pub async fn serve(mut self) -> Result<()> {
        self.start().await?;
        let result = self.run().await;
        self.stop().await;
        result
    }
}

/// One task per connection; requests within a connection are handled
/// in order, connections fully in parallel.
async fn serve_connection(stream: TcpStream, interceptor: Arc<Interceptor>) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(());
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(trimmed) {
            Ok(request) => interceptor.intercept(request).await,
            Err(e) => {
                tracing::warn!("Unparseable request: {e}");
                RpcResponse::fault(RequestId::Null, RpcFault::parse_error())
            }
        };

        let reply = serde_json::to_string(&response)?;
        write_half.write_all(format!("{reply}\n").as_bytes()).await?;
        write_half.flush().await?;
    }
}

/// Builder wiring collaborators into a [`ProxyServer`].
pub struct ProxyServerBuilder {
    config: ProxyConfig,
    recorder: Option<Arc<dyn MethodRecorder>>,
    naming: Option<Arc<dyn NameService>>,
    upstream: Option<Arc<dyn Upstream>>,
    hook: Option<Box<dyn BindHook>>,
}

impl ProxyServerBuilder {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            recorder: None,
            naming: None,
            upstream: None,
            hook: None,
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn MethodRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_name_service(mut self, naming: Arc<dyn NameService>) -> Self {
        self.naming = Some(naming);
        self
    }

    /// Inject an already-resolved upstream, bypassing the naming lookup.
    pub fn with_upstream(mut self, upstream: Arc<dyn Upstream>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn with_bind_hook(mut self, hook: Box<dyn BindHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Build, constructing the recorder from config when none was
    /// injected. Recorder file errors are fatal to construction.
    pub async fn build(self) -> Result<ProxyServer> {
        let recorder: Arc<dyn MethodRecorder> = match self.recorder {
            Some(recorder) => recorder,
            None => match &self.config.recorder {
                RecorderConfig::Null => Arc::new(NullRecorder::new()),
                RecorderConfig::Log { path } => Arc::new(LogRecorder::open(path).await?),
                RecorderConfig::Script { path } => Arc::new(ScriptRecorder::open(path).await?),
            },
        };

        let naming: Arc<dyn NameService> = match self.naming {
            Some(naming) => naming,
            None => Arc::new(StaticNameService::with_entries(
                self.config
                    .naming
                    .iter()
                    .map(|e| (e.name.clone(), e.addr)),
            )),
        };

        Ok(ProxyServer {
            config: self.config,
            registry: ReferenceRegistry::new(),
            recorder,
            naming,
            upstream: self.upstream,
            hook: self.hook,
            listener: None,
            admin: None,
            shutdown: None,
            listen_addr: None,
        })
    }
}
