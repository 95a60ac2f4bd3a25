use utoipa::OpenApi;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(utoipa::ToSchema)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

#[derive(utoipa::ToSchema)]
pub struct LoginRequest { pub email: String, pub password: String }

#[derive(utoipa::ToSchema)]
pub struct FeeLineDoc { pub name: String, pub amount: i64 }

#[derive(utoipa::ToSchema)]
pub struct CreateSchoolRequest {
    pub name: String,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub fee_lines: Option<Vec<FeeLineDoc>>,
    pub installment: Option<bool>,
}

#[derive(utoipa::ToSchema)]
pub struct InitializePaymentRequest { pub term: i32 }

#[derive(utoipa::ToSchema)]
pub struct SubscriptionRequest {
    pub term: i32,
    pub card_name: String,
    pub card_number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
}

#[derive(utoipa::ToSchema)]
pub struct ImportOutcomeDoc {
    pub created: usize,
    pub updated: usize,
    pub custom_fields: Vec<String>,
}

#[derive(utoipa::ToSchema)]
pub struct SessionOutputDoc {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub role: String,
    pub token: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::schools::create,
        crate::routes::schools::upload_students,
        crate::routes::payments::initialize,
        crate::routes::payments::subscription,
        crate::routes::payments::webhook,
    ),
    components(
        schemas(
            HealthResponse,
            RegisterRequest,
            LoginRequest,
            FeeLineDoc,
            CreateSchoolRequest,
            InitializePaymentRequest,
            SubscriptionRequest,
            ImportOutcomeDoc,
            SessionOutputDoc,
        )
    ),
    tags(
        (name = "health"),
        (name = "auth"),
        (name = "schools"),
        (name = "payments"),
    )
)]
pub struct ApiDoc;
