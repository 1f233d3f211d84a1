//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Instant Win API",
        version = "0.1.0",
        description = "Instant-win campaign builder.\n\nValidates conversational flow graphs before publication and runs probability-weighted prize draws.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Flows", description = "Flow graph structural validation"),
        (name = "Lottery", description = "Instant-win draws and draw statistics"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Flows
        crate::rest::handle_validate_flow,
        crate::rest::handle_validate_template,
        // Lottery
        crate::rest::handle_draw,
        crate::rest::handle_lottery_stats,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        // Flow types
        instantwin_core::types::Node,
        instantwin_core::types::Edge,
        instantwin_core::types::NodeType,
        instantwin_flow::FlowSnapshot,
        instantwin_flow::ValidationResult,
        instantwin_flow::ValidationIssue,
        instantwin_flow::IssueKind,
        instantwin_flow::FlowStatistics,
        // Lottery types
        instantwin_lottery::LotteryRequest,
        instantwin_lottery::LotteryResult,
        instantwin_lottery::PrizeSummary,
        instantwin_lottery::LotteryStats,
        // REST error/health types
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;
