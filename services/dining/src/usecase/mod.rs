pub mod alert;
pub mod approval;
pub mod auth;
pub mod enrollment;
pub mod hardware;
pub mod meal;
pub mod meal_plan;
pub mod report;
pub mod user;
pub mod verification;
