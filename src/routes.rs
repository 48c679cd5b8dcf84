use crate::{
    api::{attendance, chat, employee, leave_allocation, leave_application, payroll, report},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
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

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(handlers::protected)
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee)),
                    ),
            )
            .service(
                web::scope("/leave")
                    // literal paths before /{id}
                    .service(
                        web::resource("/balance")
                            .route(web::get().to(leave_application::leave_balance)),
                    )
                    .service(
                        web::resource("/probation")
                            .route(web::get().to(leave_application::probation_status)),
                    )
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_application::leave_list))
                            .route(web::post().to(leave_application::create_leave)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave_application::get_leave))
                            .route(web::put().to(leave_application::update_leave)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_application::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_application::reject_leave)),
                    )
                    .service(
                        web::resource("/{id}/ask-clarification")
                            .route(web::post().to(leave_application::ask_clarification)),
                    )
                    .service(
                        web::resource("/{id}/reply")
                            .route(web::post().to(leave_application::reply_clarification)),
                    ),
            )
            .service(
                web::scope("/leave-allocations")
                    .service(
                        web::resource("/preview")
                            .route(web::get().to(leave_allocation::allocation_preview)),
                    )
                    .service(
                        web::resource("/auto-allocate")
                            .route(web::post().to(leave_allocation::auto_allocate)),
                    )
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_allocation::list_allocations)),
                    ),
            )
            .service(
                web::scope("/chat")
                    .service(
                        web::resource("/broadcasts")
                            .route(web::post().to(chat::create_broadcast)),
                    )
                    .service(
                        web::resource("/broadcasts/{id}/send")
                            .route(web::post().to(chat::send_broadcast)),
                    )
                    .service(
                        web::resource("/broadcasts/{id}/queue")
                            .route(web::get().to(chat::broadcast_queue)),
                    ),
            )
            .service(
                web::scope("/reports")
                    .service(
                        web::resource("/attendance")
                            .route(web::get().to(report::attendance_report)),
                    )
                    .service(
                        web::resource("/purchase-settlement")
                            .route(web::get().to(report::purchase_settlement_report)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::put().to(attendance::check_out)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    .service(
                        web::resource("")
                            .route(web::get().to(payroll::list_slips)),
                    )
                    .service(
                        web::resource("/generate")
                            .route(web::post().to(payroll::generate_slips)),
                    ),
            ),
    );
}
