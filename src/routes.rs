use crate::{
    api::{attendance, balance, leave},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let api_limiter = Arc::new(build_limiter(config.rate_api_per_min));
    let batch_limiter = Arc::new(build_limiter(config.rate_batch_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(api_limiter)
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave::leave_list))
                            .route(web::post().to(leave::apply_leave)),
                    )
                    // /leave/{id}
                    .service(web::resource("/{id}").route(web::get().to(leave::get_leave)))
                    // /leave/{id}/cancel
                    .service(
                        web::resource("/{id}/cancel").route(web::put().to(leave::cancel_leave)),
                    )
                    // /leave/{id}/approve
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(leave::approve_leave)),
                    )
                    // /leave/{id}/reject
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(leave::reject_leave)),
                    ),
            )
            .service(
                web::scope("/balances")
                    // /balances
                    .service(
                        web::resource("")
                            .route(web::get().to(balance::list_balances)),
                    )
                    // /balances/initialize (whole tenant, batched)
                    .service(
                        web::resource("/initialize")
                            .wrap(batch_limiter.clone())
                            .route(web::post().to(balance::initialize_balances)),
                    )
                    // /balances/{teacher_id}
                    .service(
                        web::resource("/{teacher_id}")
                            .route(web::get().to(balance::get_balance))
                            .route(web::put().to(balance::update_balance)),
                    )
                    // /balances/{teacher_id}/initialize
                    .service(
                        web::resource("/{teacher_id}/initialize")
                            .route(web::post().to(balance::initialize_balance)),
                    ),
            )
            .service(
                web::scope("/quota-settings").service(
                    web::resource("")
                        .route(web::get().to(balance::get_quota_settings))
                        .route(web::put().to(balance::update_quota_settings)),
                ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::post().to(attendance::mark_attendance)),
                    )
                    // /attendance/bulk
                    .service(
                        web::resource("/bulk")
                            .wrap(batch_limiter.clone())
                            .route(web::post().to(attendance::bulk_mark_attendance)),
                    )
                    // /attendance/monthly
                    .service(
                        web::resource("/monthly")
                            .route(web::get().to(attendance::monthly_attendance)),
                    )
                    // /attendance/stats
                    .service(
                        web::resource("/stats").route(web::get().to(attendance::attendance_stats)),
                    )
                    // /attendance/day
                    .service(
                        web::resource("/day").route(web::get().to(attendance::day_attendance)),
                    )
                    // /attendance/auto-mark (daily scheduler entry point)
                    .service(
                        web::resource("/auto-mark")
                            .wrap(batch_limiter)
                            .route(web::post().to(attendance::auto_mark_leave)),
                    ),
            ),
    );
}
