use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post, put},
};
use romance_backend::{
    AppState,
    config::Config,
    generation::{HttpCompletionClient, MessageGenerator, RedisCache},
    middleware::{RateLimiter, auth_middleware, log_errors, rate_limit},
    notify::Notifier,
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'romance_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // 设置 Redis 客户端
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let redis_arc = Arc::new(redis_client);

    // 组装生成器：上游补全服务 + Redis 缓存 + 进程内滚动历史
    let provider =
        HttpCompletionClient::new(&config).expect("Failed to create completion client");
    let cache = RedisCache::new(Arc::clone(&redis_arc));
    let generator = Arc::new(MessageGenerator::new(
        Arc::new(provider),
        Arc::new(cache),
        config.completion_max_tokens,
    ));

    let notifier = Arc::new(Notifier::new(&config).expect("Failed to create notifier"));

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
        redis: redis_arc,
        generator,
        notifier,
    };

    // 设置限流器，并定期清理不活跃客户端的窗口
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_requests,
        config.rate_limit_window(),
    ));
    {
        let limiter = Arc::clone(&rate_limiter);
        let interval = config.rate_limit_window();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                limiter.prune_idle(Instant::now());
            }
        });
    }

    // 将路由分为公开路由和受保护路由
    let public_routes = Router::new()
        .route("/users/register", post(routes::user::register))
        .route("/users/login", post(routes::user::login));

    let protected_routes = Router::new()
        // 用户路由
        .route("/users/update-password", put(routes::user::update_password))
        .route(
            "/users/update-preference",
            put(routes::user::update_preference),
        )
        .route("/users/settings", get(routes::user::settings))
        .route("/users/check-token", get(routes::user::check_token))
        // 情话生成与历史
        .route("/messages/generate", post(routes::message::generate_message))
        .route("/messages/recent", get(routes::message::recent_messages))
        .route("/messages/history", get(routes::message::message_history))
        // 反馈
        .route("/feedback", post(routes::feedback::submit_feedback))
        .route("/feedback/list", get(routes::feedback::list_feedback))
        // 纪念日与礼物推荐
        .route("/occasions", post(routes::occasion::create_occasion))
        .route("/occasions", get(routes::occasion::upcoming_occasions))
        .route(
            "/gifts/recommendations",
            get(routes::occasion::gift_recommendations),
        )
        // 应用认证中间件
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // 创建基础路由
    let router = Router::new().nest(
        "/api",
        Router::new().merge(public_routes).merge(protected_routes),
    );

    // 添加日志中间件和限流中间件
    let router = router.layer(axum::middleware::from_fn(log_errors)).layer(
        axum::middleware::from_fn_with_state(rate_limiter, rate_limit),
    );

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        let cors = CorsLayer::permissive();
        router.layer(cors)
    };

    // 添加应用状态
    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
