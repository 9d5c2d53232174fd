// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn session_serde_round_trip() {
    let session = Session {
        chroot: Some(PathBuf::from("/srv/jail")),
        user: Some(1000),
        conf_path: Some(PathBuf::from("/srv/jail/etc/stoker")),
    };

    let json = serde_json::to_string(&session).unwrap();
    let back: Session = serde_json::from_str(&json).unwrap();
    assert_eq!(back, session);
}

#[test]
fn missing_fields_default_to_none() {
    let session: Session = serde_json::from_str("{}").unwrap();
    assert_eq!(session, Session::default());
}
