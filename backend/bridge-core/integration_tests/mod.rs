mod error {
    mod launch;
    mod session;
    mod transport;
}

mod launcher {
    mod process;
}

mod session_tests {
    pub mod helpers;
    mod launch;
    mod session;
}
