//! sea-orm entities for the dining service.

pub mod enrollments;
pub mod meal_plans;
pub mod meal_records;
pub mod principals;
pub mod student_profiles;
pub mod tokens;
