pub mod admin;
pub mod analytics;
pub mod auth;
pub mod chat;
pub mod core;
pub mod courses;
pub mod dashboard;
pub mod quizzes;
pub mod roadmap;
pub mod wellbeing;
