use std::{path::PathBuf, sync::Arc};

use poem::{
    EndpointExt, Route,
    endpoint::BoxEndpoint,
    middleware::AddData,
};

use crate::{
    core::generator::Generator,
    routes::{cors::AllowAllOrigins, generate::generate},
    settings::Config,
};

pub mod core;
pub mod routes;
pub mod schemas;
pub mod settings;

pub struct AppState {
    pub generator: Arc<dyn Generator>,
    /// Directory the generator renders artifacts into
    pub output_dir: PathBuf,
}

pub fn init_route(app_state: Arc<AppState>, config: &Config) -> BoxEndpoint<'static> {
    let prefix = config.prefix.clone().unwrap_or("/".to_string());
    let route = Route::new()
        .nest(prefix, Route::new().at("/generate", generate))
        .with(AddData::new(app_state));

    if config.allow_all_origins {
        route.with(AllowAllOrigins).boxed()
    } else {
        route.boxed()
    }
}
