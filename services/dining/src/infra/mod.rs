pub mod db;
pub mod face;
