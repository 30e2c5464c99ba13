use proptest::prelude::*;
use tessera_core::{ApiResult, HttpCode, InvalidHttpCode};

type Probe = ApiResult<(), String>;

proptest! {
    #[test]
    fn error_codes_build_http_failures(code in 400u16..=599) {
        let result = Probe::try_http_failure(code, None).expect("error code accepted");
        prop_assert_eq!(
            result.failure_ref().and_then(|failure| failure.http_code()).map(HttpCode::as_u16),
            Some(code)
        );
    }

    #[test]
    fn success_codes_are_rejected(code in 200u16..=299) {
        prop_assert_eq!(HttpCode::try_from(code), Err(InvalidHttpCode(code)));
        prop_assert!(Probe::try_http_failure(code, None).is_err());
    }

    #[test]
    fn codes_outside_status_range_are_rejected(
        code in prop_oneof![0u16..200, 600u16..=u16::MAX]
    ) {
        prop_assert!(HttpCode::try_from(code).is_err());
    }
}

#[test]
#[should_panic]
fn http_failure_panics_on_success_status() {
    let _ = Probe::http_failure(204, None);
}
