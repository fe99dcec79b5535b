use actix::Actor;
use actix_web::http::header::CACHE_CONTROL;
use actix_web::{middleware::DefaultHeaders, web::Data, App, HttpServer};
use anyhow::Context as AnyhowContext;
use std::env;
use std::sync::Arc;
use vt_catalog::reseller::FileSystemResellerRepository;
use vt_catalog::store::ContentApiStore;
use vt_catalog::{control, SELF_ADDR};
use vt_types::catalog::CatalogStore;
use vt_types::reseller::service::ResellerService;
use vt_types::reseller::OverrideRepository;

#[actix_web::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }

    let content_store = Arc::new(ContentApiStore::from_env()?);
    let catalog_store: Arc<dyn CatalogStore> = content_store.clone();
    let override_repo: Arc<dyn OverrideRepository> = content_store;

    let reseller_service =
        ResellerService::new(Arc::new(FileSystemResellerRepository::new())).start();

    let cache_ttl: u64 = envmnt::get_parse("CATALOG_CACHE_TTL_SECS").unwrap_or(600);

    log::info!("Starting catalog server on {}:8080", SELF_ADDR.as_str());

    HttpServer::new(move || {
        App::new()
            .wrap(
                DefaultHeaders::new()
                    .add((CACHE_CONTROL, format!("public, max-age={cache_ttl}"))),
            )
            .app_data(Data::new(catalog_store.clone()))
            .app_data(Data::new(override_repo.clone()))
            .app_data(Data::new(reseller_service.clone()))
            .service(control::catalog::list_brands)
            .service(control::catalog::vehicle_view)
            .service(control::catalog::stage_view)
            .service(control::reseller_api::get_config)
            .service(control::reseller_api::update_config)
            .service(control::reseller_api::list_overrides)
            .service(control::reseller_api::upsert_override)
            .service(control::reseller_api::remove_override)
            .default_service(actix_web::web::route().to(control::not_found))
    })
    .bind((SELF_ADDR.as_str(), 8080))
    .context("Failed to bind server to port 8080. Is the port already in use?")?
    .run()
    .await?;
    Ok(())
}
