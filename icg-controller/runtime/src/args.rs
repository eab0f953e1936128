use crate::{
    api::{Api, ApiConfig},
    metrics::ApiMetrics,
    server,
    store::KubeStore,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::{net::SocketAddr, time::Duration};
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "icg", about = "An Istio traffic management controller")]
pub struct Args {
    #[clap(long, default_value = "icg=info,warn", env = "ICG_CONTROLLER_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    #[clap(long, default_value = "0.0.0.0:3011")]
    api_addr: SocketAddr,

    /// The namespace whose mesh configuration is reported.
    #[clap(long, default_value = "default", env = "NAMESPACE")]
    namespace: String,

    /// Gateways that synthesized virtual services are bound to.
    #[clap(
        long = "gateway",
        default_value = "reactapp-gateway",
        value_delimiter = ','
    )]
    gateways: Vec<String>,

    #[clap(long, default_value = "10000")]
    store_timeout_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            api_addr,
            namespace,
            gateways,
            store_timeout_ms,
        } = self;

        if namespace.is_empty() {
            bail!("--namespace must not be empty");
        }
        let gateways = gateways
            .into_iter()
            .filter(|gw| !gw.is_empty())
            .collect::<Vec<_>>();
        if gateways.is_empty() {
            bail!("at least one --gateway must be specified");
        }

        let mut prom = <Registry>::default();
        let api_metrics = ApiMetrics::register(prom.sub_registry_with_prefix("icg"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        info!(%namespace, ?gateways, "Configured");
        let api = Api::new(
            KubeStore::new(runtime.client()),
            ApiConfig {
                namespace,
                gateways,
                store_timeout: Duration::from_millis(store_timeout_ms),
            },
            api_metrics,
        );
        tokio::spawn(
            server::serve(api_addr, api, runtime.shutdown_handle()).instrument(info_span!("api")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the
        // background tasks to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
