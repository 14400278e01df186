use api::{tutor::ChatCompletion, upload::Uploader, Portal};
use core::{convert::Infallible, pin::pin};
use db::{Config, Database, NoTls};
use http_body_util::{BodyExt, Limited};
use hyper::{body::Incoming, server::conn::http1, service::service_fn, Request, StatusCode};
use hyper_util::rt::TokioIo;
use model::roster::Roster;
use std::{
    env,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::{net::TcpListener, runtime::Runtime};

/// Request bodies beyond this many bytes are refused.
const MAX_BODY_SIZE: usize = 8 << 20;

/// How often idle sessions are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

async fn handle(portal: Arc<Portal>, req: Request<Incoming>) -> Result<api::Reply, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match Limited::new(body, MAX_BODY_SIZE).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            log::warn!("cannot read request body: {err}");
            return Ok(api::empty(StatusCode::PAYLOAD_TOO_LARGE));
        }
    };

    let path = parts.uri.path();
    let query = parts.uri.query().unwrap_or_default();
    let res = match portal.try_respond(&parts.method, path, query, &parts.headers, body).await {
        Ok(res) => res,
        Err(status) => {
            log::debug!("{} {path} -> {status}", parts.method);
            api::empty(status)
        }
    };
    Ok(res)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parse environment variables
    let port = env::var("PORT")?.parse()?;
    let roster: Roster = env::var("ROSTER")?.parse().map_err(anyhow::Error::msg)?;
    let user = env::var("PG_USERNAME")?;
    let pass = env::var("PG_PASSWORD")?;
    let host = env::var("PG_HOSTNAME")?;
    let data = env::var("PG_DATABASE")?;
    let pg_port = match env::var("PG_PORT") {
        Ok(pg_port) => pg_port.parse()?,
        _ => 5432,
    };

    let tutor = match env::var("OPENAI_API_KEY") {
        Ok(key) => {
            let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| ChatCompletion::DEFAULT_MODEL.into());
            let base = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| ChatCompletion::DEFAULT_BASE_URL.into());
            log::info!("tutor enabled with model {model}");
            Some(ChatCompletion::new(key, model, &base).map_err(anyhow::Error::msg)?)
        }
        _ => {
            log::warn!("OPENAI_API_KEY is not set; tutor features are disabled");
            None
        }
    };

    let uploader = match env::var("IMGBB_API_KEY") {
        Ok(key) => {
            let endpoint = env::var("IMGBB_ENDPOINT").unwrap_or_else(|_| Uploader::DEFAULT_ENDPOINT.into());
            Some(Uploader::new(key, endpoint).map_err(anyhow::Error::msg)?)
        }
        _ => {
            log::warn!("IMGBB_API_KEY is not set; image uploads are disabled");
            None
        }
    };

    let runtime = Runtime::new()?;
    let (listener, portal) = runtime.block_on(async {
        // Connect to the database
        let (client, conn) =
            Config::new().user(&user).password(&pass).host(&host).dbname(&data).port(pg_port).connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                log::error!("database connection closed: {err}");
            }
        });

        let db = Database::from(client);
        db.migrate().await.map_err(anyhow::Error::msg)?;
        let admins = roster.members().iter().filter(|member| member.admin).count();
        log::info!("connected to the database; {} members on the roster ({admins} admins)", roster.members().len());

        let addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, port).into();
        let listener = TcpListener::bind(addr).await?;
        log::info!("listening on {addr}");

        let mut portal = Portal::new(db, roster);
        if let Some(tutor) = tutor {
            portal = portal.with_tutor(tutor);
        }
        if let Some(uploader) = uploader {
            portal = portal.with_uploader(uploader);
        }
        anyhow::Ok((listener, Arc::new(portal)))
    })?;

    // Run the server
    runtime.block_on(async move {
        let sweeper = portal.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let evicted = sweeper.evict_idle_sessions();
                if evicted > 0 {
                    log::info!("evicted {evicted} idle sessions");
                }
            }
        });

        let mut stop = pin!(tokio::signal::ctrl_c());
        loop {
            let (stream, peer) = tokio::select! {
                biased;
                res = &mut stop => break res?,
                res = listener.accept() => match res {
                    Ok(pair) => pair,
                    Err(err) => {
                        log::error!("cannot accept connection: {err}");
                        continue;
                    }
                },
            };

            let outer = portal.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| handle(outer.clone(), req));
                if let Err(err) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                    log::error!("connection with {peer} failed: {err}");
                }
            });
        }

        log::info!("shutting down");
        anyhow::Ok(())
    })
}
