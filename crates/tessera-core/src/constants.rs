pub mod error_codes {
    /// The calling device must prove itself before the request is accepted.
    pub const REQUIRES_ASSERTION: &str = "requires_assertion";

    /// Nested under `requires_assertion` when the device has never been attested.
    pub const REQUIRES_DEVICE_ATTESTATION: &str = "requires_device_attestation";
}

pub mod endpoints {
    pub const CLIENT: &str = "/client";
    pub const CLIENT_SESSIONS: &str = "/client/sessions";
    pub const CLIENT_VERIFY: &str = "/client/verify";
    pub const DEVICE_ATTESTATION: &str = "/client/device_attestation";
    pub const DEVICE_ATTESTATION_CHALLENGES: &str = "/client/device_attestation/challenges";

    /// Multipart upload; callers supply their own content type.
    pub const PROFILE_IMAGE: &str = "/me/profile_image";

    #[must_use]
    pub fn session_tokens(session_id: &str, template: Option<&str>) -> String {
        match template {
            Some(template) => format!("/sessions/{session_id}/tokens/{template}"),
            None => format!("/sessions/{session_id}/tokens"),
        }
    }
}

pub mod storage_keys {
    pub const DEVICE_ID: &str = "device_id";
    pub const DEVICE_TOKEN: &str = "device_token";
}
