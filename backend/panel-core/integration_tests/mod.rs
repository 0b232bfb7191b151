mod broker_tests {
    pub mod helpers;

    mod config;
    mod continuation;
    mod engine;
    mod handshake;
    mod helper_manager;
    mod run_loop;
}

mod proxy_tests {
    pub mod helpers;

    mod proxy;
}
