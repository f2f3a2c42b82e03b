pub mod app;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod platform;
pub mod repos;
pub mod schema;
pub mod security;
pub mod web;
