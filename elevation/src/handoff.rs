//! Windows fallback for getting the secret into the elevated child.
//!
//! UAC starts elevated processes with a fresh environment block, so the
//! credential variable set on the launcher's `Command` never arrives. The
//! parent instead serves the secret once over a named pipe that only the
//! owning user and SYSTEM may open. The pipe name travels on the command line
//! after [`CREDENTIAL_PIPE_ARG`]; the secret never does.

use crate::Credential;
use crate::ElevationError;
#[cfg(windows)]
use std::time::Duration;

pub const CREDENTIAL_PIPE_ARG: &str = "--credential-pipe";

/// How long the elevated child waits for the parent's pipe.
#[cfg(windows)]
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads the secret the parent serves on `pipe_name`.
pub async fn receive_credential(pipe_name: &str) -> Result<Credential, ElevationError> {
    #[cfg(windows)]
    {
        match tokio::time::timeout(RECEIVE_TIMEOUT, imp::receive(pipe_name)).await {
            Ok(Ok(credential)) => Ok(credential),
            Ok(Err(err)) => {
                tracing::error!("credential pipe {pipe_name} unusable: {err}");
                Err(ElevationError::CredentialMissing)
            }
            Err(_) => {
                tracing::error!("credential pipe {pipe_name} timed out");
                Err(ElevationError::CredentialMissing)
            }
        }
    }
    #[cfg(not(windows))]
    {
        tracing::error!("credential pipe {pipe_name} ignored: only supported on Windows");
        Err(ElevationError::CredentialMissing)
    }
}

#[cfg(windows)]
pub(crate) use imp::serve_credential;

#[cfg(windows)]
mod imp {
    use crate::Credential;
    use crate::ElevationError;
    use std::ffi::c_void;
    use std::io;
    use std::path::PathBuf;
    use std::ptr;
    use std::time::Duration;
    use tokio::io::AsyncBufReadExt;
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;
    use tokio::io::BufReader;
    use tokio::net::windows::named_pipe::ClientOptions;
    use tokio::net::windows::named_pipe::NamedPipeServer;
    use tokio::net::windows::named_pipe::ServerOptions;
    use uuid::Uuid;
    use windows_sys::Win32::Foundation::HLOCAL;
    use windows_sys::Win32::Foundation::LocalFree;
    use windows_sys::Win32::Security::Authorization::ConvertStringSecurityDescriptorToSecurityDescriptorW;
    use windows_sys::Win32::Security::PSECURITY_DESCRIPTOR;
    use windows_sys::Win32::Security::SECURITY_ATTRIBUTES;
    use zeroize::Zeroizing;

    const SDDL_REVISION_1: u32 = 1;
    /// Owner and SYSTEM only, no inherited entries.
    const PIPE_SDDL: &str = "D:P(A;;GA;;;OW)(A;;GA;;;SY)";

    fn to_wide(value: &str) -> Vec<u16> {
        value.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn create_server(name: &str) -> io::Result<NamedPipeServer> {
        let sddl = to_wide(PIPE_SDDL);
        let mut descriptor: PSECURITY_DESCRIPTOR = ptr::null_mut();
        let ok = unsafe {
            ConvertStringSecurityDescriptorToSecurityDescriptorW(
                sddl.as_ptr(),
                SDDL_REVISION_1,
                &mut descriptor,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        let mut attributes = SECURITY_ATTRIBUTES {
            nLength: std::mem::size_of::<SECURITY_ATTRIBUTES>() as u32,
            lpSecurityDescriptor: descriptor,
            bInheritHandle: 0,
        };
        let server = unsafe {
            ServerOptions::new()
                .first_pipe_instance(true)
                .max_instances(1)
                .reject_remote_clients(true)
                .create_with_security_attributes_raw(
                    name,
                    &mut attributes as *mut SECURITY_ATTRIBUTES as *mut c_void,
                )
        };
        unsafe {
            LocalFree(descriptor as HLOCAL);
        }
        server
    }

    /// Creates a one-shot pipe carrying `credential` and returns its name.
    /// The pipe is abandoned after `timeout` if nobody connects.
    pub(crate) fn serve_credential(
        credential: &Credential,
        timeout: Duration,
    ) -> Result<String, ElevationError> {
        let name = format!(r"\\.\pipe\remotehand-credential-{}", Uuid::new_v4().simple());
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
            ElevationError::io("serving credential on", PathBuf::from(&name))(io::Error::other(
                err,
            ))
        })?;
        let mut server =
            create_server(&name).map_err(ElevationError::io("creating", PathBuf::from(&name)))?;
        let payload = Zeroizing::new(format!("{}\n", credential.expose_secret()));
        let pipe = name.clone();

        runtime.spawn(async move {
            let served = tokio::time::timeout(timeout, async {
                server.connect().await?;
                server.write_all(payload.as_bytes()).await?;
                // Wait for the acknowledgement so the data is read before the
                // handle closes.
                let mut ack = [0u8; 1];
                let _ = server.read(&mut ack).await;
                io::Result::Ok(())
            })
            .await;
            match served {
                Ok(Ok(())) => tracing::info!("credential handed to elevated child over {pipe}"),
                Ok(Err(err)) => tracing::warn!("credential pipe {pipe} failed: {err}"),
                Err(_) => tracing::warn!("no elevated child connected to {pipe}"),
            }
        });
        Ok(name)
    }

    pub(super) async fn receive(name: &str) -> io::Result<Credential> {
        let client = ClientOptions::new().open(name)?;
        let mut reader = BufReader::new(client);
        let mut line = Zeroizing::new(Vec::new());
        reader.read_until(b'\n', &mut line).await?;
        let _ = reader.get_mut().write_all(b"\n").await;

        let text = std::str::from_utf8(&line)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        Credential::new(text.trim_end_matches(['\r', '\n']))
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
    }
}
