//! User handlers.

use axum::Json;
use fintrack::auth::UserProfile;

use super::middleware::CurrentUser;

/// Profile of the authenticated user
pub async fn profile(CurrentUser(user): CurrentUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}
