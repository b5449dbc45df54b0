use actix_web::{
    error, guard,
    web::{delete, get, post, put, resource, Json, PathConfig, Query, ServiceConfig},
    FromRequest, HttpResponse,
};

use super::page;
use crate::database::*;

pub(crate) fn init_app(cfg: &mut ServiceConfig) {
    cfg.service(resource("/").guard(guard::Get()).route(get().to(page::index)))
        .service(
            resource("/about")
                .guard(guard::Get())
                .route(get().to(page::about)),
        )
        .service(
            resource("/flags")
                .guard(guard::Get())
                .route(get().to(page::flags)),
        )
        .service(
            resource("/output_model")
                .guard(guard::Get())
                .data(Query::<ModelOutputQuery>::configure(|cfg| {
                    cfg.error_handler(|err, _| {
                        error::InternalError::from_response(
                            err,
                            HttpResponse::BadRequest().finish(),
                        )
                        .into()
                    })
                }))
                .route(get().to(page::output_model)),
        )
        .service(
            resource("/api")
                .guard(guard::Get())
                .route(get().to(page::api_index)),
        )
        .service(
            resource("/api/v1/model")
                .guard(guard::Get())
                .data(Query::<ModelOutputQuery>::configure(|cfg| {
                    cfg.error_handler(|err, _| {
                        error::InternalError::from_response(
                            err,
                            HttpResponse::BadRequest().finish(),
                        )
                        .into()
                    })
                }))
                .route(get().to(get_model_api)),
        )
        .service(
            resource("/api/v1/boathouses")
                .guard(guard::Get())
                .route(get().to(get_boathouses)),
        )
        .service(
            resource("/admin/manual_overrides")
                .guard(guard::Get())
                .route(get().to(get_manual_overrides)),
        )
        .service(
            resource("/admin/manual_overrides")
                .guard(guard::Post())
                .guard(guard::Header("content-type", "application/json"))
                .data(Json::<NewManualOverride>::configure(|cfg| {
                    cfg.error_handler(|err, _| {
                        error::InternalError::from_response(
                            err,
                            HttpResponse::BadRequest().finish(),
                        )
                        .into()
                    })
                }))
                .route(post().to(add_manual_override)),
        )
        .service(
            resource("/admin/manual_overrides/{id}")
                .guard(guard::Put())
                .guard(guard::Header("content-type", "application/json"))
                .data(PathConfig::default().error_handler(|err, _| {
                    error::InternalError::from_response(err, HttpResponse::BadRequest().finish())
                        .into()
                }))
                .data(Json::<NewManualOverride>::configure(|cfg| {
                    cfg.error_handler(|err, _| {
                        error::InternalError::from_response(
                            err,
                            HttpResponse::BadRequest().finish(),
                        )
                        .into()
                    })
                }))
                .route(put().to(update_manual_override)),
        )
        .service(
            resource("/admin/manual_overrides/{id}")
                .guard(guard::Delete())
                .data(PathConfig::default().error_handler(|err, _| {
                    error::InternalError::from_response(err, HttpResponse::BadRequest().finish())
                        .into()
                }))
                .route(delete().to(delete_manual_override)),
        )
        .service(
            resource("/admin/update_db")
                .guard(guard::Post())
                .route(post().to(update_db)),
        );
}
