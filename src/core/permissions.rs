use crate::core::locked_file::LockedFile;
use crate::utils::error::{FlockError, Result};
use nix::unistd::{fchown, getegid, geteuid, getgrouplist, getgroups, Gid, Uid, User};
use std::ffi::CString;
use std::fs::Permissions;
use std::os::fd::AsRawFd;
use std::os::unix::fs::{MetadataExt, PermissionsExt};

const SYMBOLIC: &[u8; 9] = b"rwxrwxrwx";

/// Parses `644`, `0644`, `0o644` or `rw-r--r--`.
pub fn parse_mode(value: &str) -> Result<u32> {
    let invalid = |reason: &str| FlockError::InvalidModeError {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = value.trim();
    if trimmed.len() == SYMBOLIC.len() && !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let mut mode = 0;
        for (i, (c, expected)) in trimmed.bytes().zip(SYMBOLIC).enumerate() {
            match c {
                b'-' => {}
                c if c == *expected => mode |= 1 << (8 - i),
                _ => return Err(invalid("symbolic modes look like rwxr-x---")),
            }
        }
        return Ok(mode);
    }

    let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return Err(invalid("expected octal digits"));
    }

    let mode = u32::from_str_radix(digits, 8).map_err(|_| invalid("value out of range"))?;
    if mode > 0o7777 {
        return Err(invalid("mode exceeds 0o7777"));
    }
    Ok(mode)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermissionClass {
    Owner,
    Group,
    Other,
}

impl PermissionClass {
    fn read_bit(self) -> u32 {
        match self {
            PermissionClass::Owner => 0o400,
            PermissionClass::Group => 0o040,
            PermissionClass::Other => 0o004,
        }
    }

    fn write_bit(self) -> u32 {
        self.read_bit() >> 1
    }
}

/// Groups of `uid`, or of the calling process when `None`.
fn user_groups(uid: Option<u32>) -> Result<Vec<Gid>> {
    match uid {
        None => {
            let mut groups = getgroups()?;
            groups.push(getegid());
            Ok(groups)
        }
        Some(raw) => {
            let user = User::from_uid(Uid::from_raw(raw))?
                .ok_or(FlockError::UserLookupError { uid: raw })?;
            let name = CString::new(user.name.as_str())
                .map_err(|_| FlockError::UserLookupError { uid: raw })?;
            Ok(getgrouplist(&name, user.gid)?)
        }
    }
}

impl LockedFile {
    pub fn set_perms(&self, mode: u32) -> Result<()> {
        self.file
            .set_permissions(Permissions::from_mode(mode))
            .map_err(|e| FlockError::file_io(self.path(), e))?;
        tracing::debug!("Set mode {:o} on {}", mode, self.path().display());
        Ok(())
    }

    pub fn set_perms_str(&self, mode: &str) -> Result<()> {
        self.set_perms(parse_mode(mode)?)
    }

    pub fn set_owner(&self, uid: u32) -> Result<()> {
        fchown(self.as_raw_fd(), Some(Uid::from_raw(uid)), None)?;
        Ok(())
    }

    pub fn set_group(&self, gid: u32) -> Result<()> {
        fchown(self.as_raw_fd(), None, Some(Gid::from_raw(gid)))?;
        Ok(())
    }

    pub fn mode_bits(&self) -> Result<u32> {
        Ok(self.metadata()?.mode() & 0o7777)
    }

    /// `uid` of `None` checks the effective uid of this process.
    pub fn is_user_owner(&self, uid: Option<u32>) -> Result<bool> {
        let uid = uid.map(Uid::from_raw).unwrap_or_else(geteuid);
        Ok(self.metadata()?.uid() == uid.as_raw())
    }

    pub fn is_user_in_group(&self, uid: Option<u32>) -> Result<bool> {
        let gid = Gid::from_raw(self.metadata()?.gid());
        Ok(user_groups(uid)?.contains(&gid))
    }

    pub fn user_can_read(&self, uid: Option<u32>) -> Result<bool> {
        let class = self.class_for(uid)?;
        Ok(self.mode_bits()? & class.read_bit() != 0)
    }

    pub fn user_can_write(&self, uid: Option<u32>) -> Result<bool> {
        let class = self.class_for(uid)?;
        Ok(self.mode_bits()? & class.write_bit() != 0)
    }

    /// Adds the read bit for whichever of owner, group or other `uid` falls in.
    pub fn grant_read(&self, uid: Option<u32>) -> Result<()> {
        let class = self.class_for(uid)?;
        self.set_perms(self.mode_bits()? | class.read_bit())
    }

    pub fn grant_write(&self, uid: Option<u32>) -> Result<()> {
        let class = self.class_for(uid)?;
        self.set_perms(self.mode_bits()? | class.write_bit())
    }

    fn class_for(&self, uid: Option<u32>) -> Result<PermissionClass> {
        if self.is_user_owner(uid)? {
            Ok(PermissionClass::Owner)
        } else if self.is_user_in_group(uid)? {
            Ok(PermissionClass::Group)
        } else {
            Ok(PermissionClass::Other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::locked_file::DEFAULT_PERMS;
    use crate::domain::model::OpenMode;
    use tempfile::TempDir;

    #[test]
    fn test_parse_octal_forms() {
        assert_eq!(parse_mode("644").unwrap(), 0o644);
        assert_eq!(parse_mode("0644").unwrap(), 0o644);
        assert_eq!(parse_mode("0o600").unwrap(), 0o600);
        assert_eq!(parse_mode(" 4755 ").unwrap(), 0o4755);
    }

    #[test]
    fn test_parse_symbolic() {
        assert_eq!(parse_mode("rw-r--r--").unwrap(), 0o644);
        assert_eq!(parse_mode("rwxr-x---").unwrap(), 0o750);
        assert_eq!(parse_mode("---------").unwrap(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "0o", "0688", "17777", "rw-r--r-X", "wr-r--r--", "rw", "0x644"] {
            assert!(
                matches!(parse_mode(bad), Err(FlockError::InvalidModeError { .. })),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_owner_permissions_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("perms.txt");
        let file = LockedFile::open(&path, OpenMode::ReadWrite, DEFAULT_PERMS).unwrap();

        file.set_perms_str("0200").unwrap();
        assert_eq!(file.mode_bits().unwrap(), 0o200);
        assert!(file.is_user_owner(None).unwrap());
        assert!(!file.user_can_read(None).unwrap());
        assert!(file.user_can_write(None).unwrap());

        file.grant_read(None).unwrap();
        assert_eq!(file.mode_bits().unwrap(), 0o600);
        assert!(file.user_can_read(None).unwrap());
    }

    #[test]
    fn test_owner_of_new_file_is_current_user() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mine.txt");
        let file = LockedFile::open(&path, OpenMode::Write, DEFAULT_PERMS).unwrap();

        let me = geteuid().as_raw();
        assert!(file.is_user_owner(Some(me)).unwrap());
        assert!(file.is_user_in_group(None).unwrap());
        // chown to ourselves never needs privileges
        file.set_owner(me).unwrap();
    }
}
