//! Clipdeck Gateway
//!
//! Client-side integration layer between the clipdeck front end and its
//! hosted backend platform (managed auth, blob storage, a `videos` table).
//!
//! ## Features
//!
//! - **Auth**: email/password sign-in, sign-up and sign-out, current session
//!   lookup with refresh, and session-change subscriptions
//! - **Uploads**: videos stored at `videos/<id>.<ext>` without overwriting,
//!   resolved to a public URL
//! - **Metadata**: upsert, per-user listing (newest first) and deletion that
//!   removes the stored object before the row
//! - **Credential form**: headless sign-in/sign-up modal state driving the
//!   gateway through injected callbacks
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  callbacks  ┌──────────────┐   Platform   ┌──────────────┐
//! │ Credential   │────────────▶│ Gateway      │─────────────▶│ RestPlatform │
//! │ Form         │             │              │    trait     │              │
//! └──────────────┘             └──────────────┘              └──────────────┘
//!                                                                   │
//!                                          ┌────────────────────────┼──────────────┐
//!                                          ▼                        ▼              ▼
//!                                    /auth/v1               /storage/v1      /rest/v1
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use clipdeck_gateway::{Config, Gateway, UploadFile};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     clipdeck_gateway::init_tracing(&config.service.log_level);
//!
//!     let gateway = Gateway::new(&config)?;
//!     let session = gateway
//!         .sign_in_with_email("me@example.com", "hunter22")
//!         .await?
//!         .ok_or_else(|| anyhow::anyhow!("no session"))?;
//!
//!     let file = UploadFile::from_path("clip.mov").await?;
//!     let uploaded = gateway.upload_video_file(&file).await?;
//!     println!("{} -> {}", uploaded.path, uploaded.public_url);
//!
//!     for video in gateway.fetch_videos(session.user_id()).await? {
//!         println!("{} {}", video.id, video.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth_form;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod platform;
pub mod session;
pub mod telemetry;
pub mod upload;

pub use auth_form::{AuthCallbacks, AuthMode, CredentialForm, FormView, GatewayCallbacks, SubmitOutcome};
pub use config::Config;
pub use error::GatewayError;
pub use gateway::Gateway;
pub use models::{Orientation, UploadedFile, Video, VideoRecord};
pub use platform::{Filter, Order, Platform, RestPlatform, RowQuery, UploadOptions};
pub use session::{AuthChangeEvent, AuthListener, Session, SessionStore, Subscription, User};
pub use telemetry::init_tracing;
pub use upload::UploadFile;
