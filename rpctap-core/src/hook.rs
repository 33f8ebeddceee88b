//! Bind-time hook
//!
//! Optional operator logic run once after the proxy is fully set up,
//! given the original target address, the published proxy name, and
//! the live listen address. A hook failure is logged and the proxy
//! continues serving without the hook's side effects.

use std::net::SocketAddr;

/// Context handed to the hook at bind time.
#[derive(Debug, Clone)]
pub struct BindContext {
    /// Address of the original (unwrapped) target endpoint.
    pub target: SocketAddr,

    /// Public name the proxy wrapper is published under.
    pub proxy_name: String,

    /// Address the active invocation handler is listening on.
    pub listen_addr: SocketAddr,
}

/// Operator callback executed once after proxy setup.
pub trait BindHook: Send + Sync {
    fn on_bind(&self, ctx: &BindContext) -> anyhow::Result<()>;
}

impl<F> BindHook for F
where
    F: Fn(&BindContext) -> anyhow::Result<()> + Send + Sync,
{
    fn on_bind(&self, ctx: &BindContext) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Run the hook, downgrading failure to a warning.
pub fn run_bind_hook(hook: Option<&dyn BindHook>, ctx: &BindContext) {
    let Some(hook) = hook else { return };
    if let Err(e) = hook.on_bind(ctx) {
        tracing::warn!("Bind hook failed, continuing without it: {e}");
    }
}
