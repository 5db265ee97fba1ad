pub mod biometrics;
pub mod credentials;
pub mod pasteboard;
pub mod sessions;
