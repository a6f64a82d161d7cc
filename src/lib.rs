pub mod config;
pub mod error;
pub mod server;
pub mod state;

pub mod db {
    pub mod connection;
    pub mod pool;
    pub mod postgres;
    pub mod statement;
    #[cfg(test)]
    pub mod testing;
}

pub mod models {
    pub mod appointment;
    pub mod doctor;
    pub mod envelope;
    pub mod ids;
    pub mod medical_case;
    pub mod patient;
    pub mod prescription;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod appointment;
    pub mod doctor;
    pub mod medical_case;
    pub mod patient;
    pub mod prescription;
    pub mod stats;
    pub mod user;
}

pub mod services {
    pub mod auth;
    pub mod dispatcher;
    pub mod sessions;
}

pub mod handlers {
    pub mod doctor;
    pub mod patient;
    pub mod payload;
    pub mod public;
    pub mod routes;
    pub mod system;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod auth;
}
