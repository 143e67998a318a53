//! HTTP server implementation
//!
//! hyper http1 accept loop with one spawned task per connection. Route
//! dispatch is a plain match on (method, path); the auth gateway is called
//! explicitly by the participant dispatcher, not installed as middleware.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthGateway, SystemClock, TokenIssuer, TokenValidator};
use crate::config::Args;
use crate::db::{IdentityStore, ParticipantStore};
use crate::experiments::ExperimentRegistry;
use crate::routes::{self, BoxBody};
use crate::types::{Result, WaymarkError};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: Arc<dyn ParticipantStore>,
    pub gateway: AuthGateway,
    pub experiments: ExperimentRegistry,
}

impl AppState {
    /// Build application state around a participant store
    ///
    /// The gateway gets its own narrow handle on the store plus an
    /// issuer/validator pair built once from the configured secret and TTL.
    pub fn new<S>(args: Args, store: Arc<S>, experiments: ExperimentRegistry) -> Self
    where
        S: ParticipantStore + 'static,
    {
        let secret = args.jwt_secret();
        let identities: Arc<dyn IdentityStore> = Arc::clone(&store) as Arc<dyn IdentityStore>;
        let gateway = AuthGateway::new(
            identities,
            TokenIssuer::new(&secret, args.token_ttl_seconds),
            TokenValidator::new(&secret),
            Arc::new(SystemClock),
        );

        Self {
            args,
            store,
            gateway,
            experiments,
        }
    }

    /// Assign a participant to an experiment group
    ///
    /// The assignment must exist in the configured registry; the plain
    /// labels are stored and hashed only when served.
    pub async fn assign_experiment(
        &self,
        subject_id: &str,
        experiment: &str,
        group: &str,
    ) -> Result<bool> {
        if !self.experiments.is_valid_assignment(experiment, group) {
            return Err(WaymarkError::Config(format!(
                "Unknown experiment assignment: {}/{}",
                experiment, group
            )));
        }
        self.store
            .assign_experiment(subject_id, experiment, group)
            .await
    }
}

/// Run the HTTP server until the process is stopped
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("waymark listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - insecure defaults in effect");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Browser extensions preflight cross-origin requests
        (Method::OPTIONS, _) => routes::cors_preflight(),

        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(),

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // Credential issuance
        (Method::GET, "/v1/auth") | (Method::GET, "/v1/auth/") => {
            routes::handle_issue(req, Arc::clone(&state)).await
        }

        // Authenticated participant resources
        (_, p) if p.starts_with("/v1/user/") => {
            routes::handle_participant_request(req, Arc::clone(&state)).await
        }

        (_, p) => routes::not_found(p),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryParticipantStore;
    use crate::experiments::hash_label;

    fn test_args() -> Args {
        Args {
            listen: "127.0.0.1:0".parse().unwrap(),
            mongodb_uri: "mongodb://localhost:27017".into(),
            mongodb_db: "waymark-test".into(),
            jwt_secret: Some("state-test-secret".into()),
            token_ttl_seconds: 3600,
            experiments: Some(r#"{"onboarding_tips": ["tips_on", "control"]}"#.into()),
            dev_mode: false,
            log_level: "info".into(),
        }
    }

    fn test_state() -> (AppState, Arc<MemoryParticipantStore>) {
        let args = test_args();
        let store = Arc::new(MemoryParticipantStore::new());
        let experiments = ExperimentRegistry::from_config(args.experiments.as_deref()).unwrap();
        (
            AppState::new(args, Arc::clone(&store), experiments),
            store,
        )
    }

    #[tokio::test]
    async fn test_assign_and_serve_experiment() {
        let (state, store) = test_state();
        let subject = store.find_or_create("tester@waymark.dev").await.unwrap();

        let assigned = state
            .assign_experiment(&subject, "onboarding_tips", "control")
            .await
            .unwrap();
        assert!(assigned);

        let participant = store.find_by_subject(&subject).await.unwrap().unwrap();
        assert_eq!(
            participant.experiments.get("onboarding_tips"),
            Some(&"control".to_string())
        );

        // Served view is hashed on both sides
        let view = crate::experiments::hashed_view(&participant.experiments);
        assert_eq!(
            view.get(&hash_label("onboarding_tips")),
            Some(&hash_label("control"))
        );
    }

    #[tokio::test]
    async fn test_unconfigured_assignment_rejected() {
        let (state, store) = test_state();
        let subject = store.find_or_create("tester@waymark.dev").await.unwrap();

        let result = state
            .assign_experiment(&subject, "onboarding_tips", "not_a_group")
            .await;
        assert!(matches!(result, Err(WaymarkError::Config(_))));
    }

    #[tokio::test]
    async fn test_gateway_wired_to_state_store() {
        use crate::auth::IssueCredentials;

        let (state, store) = test_state();
        let session = state
            .gateway
            .issue(&IssueCredentials::from_email("Tester@Waymark.dev"))
            .await
            .unwrap();

        // The gateway and the routes see the same participant
        let participant = store
            .find_by_subject(&session.subject_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(participant.email, "tester@waymark.dev");
    }
}
