use crate::ElevationError;

#[cfg(windows)]
const SECURITY_BUILTIN_DOMAIN_RID: u32 = 0x0000_0020;
#[cfg(windows)]
const DOMAIN_ALIAS_RID_ADMINS: u32 = 0x0000_0220;

/// True when the current token is a member of the local Administrators group.
#[cfg(windows)]
pub fn is_elevated() -> Result<bool, ElevationError> {
    use std::ffi::c_void;
    use windows_sys::Win32::Foundation::GetLastError;
    use windows_sys::Win32::Security::AllocateAndInitializeSid;
    use windows_sys::Win32::Security::CheckTokenMembership;
    use windows_sys::Win32::Security::FreeSid;
    use windows_sys::Win32::Security::SECURITY_NT_AUTHORITY;

    unsafe {
        let mut administrators_group: *mut c_void = std::ptr::null_mut();
        let ok = AllocateAndInitializeSid(
            &SECURITY_NT_AUTHORITY,
            2,
            SECURITY_BUILTIN_DOMAIN_RID,
            DOMAIN_ALIAS_RID_ADMINS,
            0,
            0,
            0,
            0,
            0,
            0,
            &mut administrators_group,
        );
        if ok == 0 {
            return Err(ElevationError::ElevationCheck(format!(
                "AllocateAndInitializeSid failed: {}",
                GetLastError()
            )));
        }
        let mut is_member = 0i32;
        let check = CheckTokenMembership(0, administrators_group, &mut is_member as *mut _);
        FreeSid(administrators_group as *mut _);
        if check == 0 {
            return Err(ElevationError::ElevationCheck(format!(
                "CheckTokenMembership failed: {}",
                GetLastError()
            )));
        }
        Ok(is_member != 0)
    }
}

/// True when running with an effective uid of root.
#[cfg(unix)]
pub fn is_elevated() -> Result<bool, ElevationError> {
    Ok(unsafe { libc::geteuid() } == 0)
}
