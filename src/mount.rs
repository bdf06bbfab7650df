//! Mount orchestration
//!
//! Resolves a mount target (bare server address or virtual-IP range) into a
//! set of kernel mounts and owns their lifecycle. One mount per VIP spreads
//! client connections across cluster nodes; all mounts attach the same
//! export, so every mount point shows the same remote directory.
//!
//! Range problems are recoverable by contract: any malformed range falls
//! back to a single mount on the bare server address. A failed mount
//! command is fatal to the client.

use crate::config::MountType;
use crate::error::{MountError, VipRangeError};
use crate::shell;
use std::env;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Immutable description of what to mount, resolved from the CLI
#[derive(Debug, Clone)]
pub struct MountTarget {
    /// Sharing-protocol version
    pub protocol: MountType,
    /// Cluster server hostname (fallback connection target)
    pub server: String,
    /// Export path on the cluster
    pub export: String,
    /// Optional virtual IP range (start, end), inclusive
    pub vip_range: Option<(String, String)>,
    /// Active cluster nodes (informational, reported to the controller)
    pub nodes: u32,
    /// Filesystem domains (informational)
    pub domains: u32,
}

impl MountTarget {
    pub fn new(
        protocol: MountType,
        server: impl Into<String>,
        export: impl Into<String>,
        start_vip: Option<String>,
        end_vip: Option<String>,
        nodes: u32,
        domains: u32,
    ) -> Self {
        let vip_range = match (start_vip, end_vip) {
            (Some(start), Some(end)) => Some((start, end)),
            // A half-specified range is malformed; resolution falls back.
            _ => None,
        };
        Self {
            protocol,
            server: server.into(),
            export: export.into(),
            vip_range,
            nodes,
            domains,
        }
    }

    /// Connection addresses for this target, ascending.
    ///
    /// A well-formed VIP range yields one address per range member; any
    /// malformed range (missing endpoint, unparsable address, reversed
    /// bounds) logs a warning and yields the bare server address. Range
    /// errors never propagate past this point.
    pub fn addresses(&self) -> Vec<String> {
        let range = match &self.vip_range {
            Some((start, end)) => expand_vip_range(start, end),
            None => Err(VipRangeError::Missing),
        };

        match range {
            Ok(addrs) => addrs.iter().map(Ipv4Addr::to_string).collect(),
            Err(reason) => {
                warn!(
                    %reason,
                    server = %self.server,
                    "VIP range is bad or missing, falling back to the storage server address"
                );
                vec![self.server.clone()]
            }
        }
    }
}

/// Expand an inclusive IPv4 range into its members, ascending.
pub fn expand_vip_range(start: &str, end: &str) -> Result<Vec<Ipv4Addr>, VipRangeError> {
    let start_addr: Ipv4Addr = start
        .trim()
        .parse()
        .map_err(|_| VipRangeError::Unparsable(start.to_string()))?;
    let end_addr: Ipv4Addr = end
        .trim()
        .parse()
        .map_err(|_| VipRangeError::Unparsable(end.to_string()))?;

    let (lo, hi) = (u32::from(start_addr), u32::from(end_addr));
    if lo > hi {
        return Err(VipRangeError::Reversed {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    Ok((lo..=hi).map(Ipv4Addr::from).collect())
}

/// A local path with the export attached
#[derive(Debug, Clone)]
pub struct MountPoint {
    /// Connection address this mount goes through
    pub address: String,
    /// Local directory the export is attached at
    pub path: PathBuf,
    mounted: bool,
}

impl MountPoint {
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }
}

/// Owns the mount set for one client run
pub struct Mounter {
    target: MountTarget,
    base_dir: PathBuf,
    mount_timeout: Duration,
    mount_points: Vec<MountPoint>,
}

impl Mounter {
    pub fn new(target: MountTarget, base_dir: impl Into<PathBuf>, mount_timeout: Duration) -> Self {
        Self {
            target,
            base_dir: base_dir.into(),
            mount_timeout,
            mount_points: Vec::new(),
        }
    }

    pub fn target(&self) -> &MountTarget {
        &self.target
    }

    pub fn mount_points(&self) -> &[MountPoint] {
        &self.mount_points
    }

    /// Local directory a given address mounts at
    pub fn mount_point_path(&self, address: &str) -> PathBuf {
        let safe = address.replace(['.', ':'], "_");
        self.base_dir.join(format!("vfs_stress_{safe}"))
    }

    /// Attach the export once per resolved address.
    ///
    /// Fatal on the first failed mount: the error is logged together with
    /// the current working directory and returned. Nothing is retried.
    pub fn mount_all(&mut self) -> Result<&[MountPoint], MountError> {
        let addresses = self.target.addresses();
        info!(
            server = %self.target.server,
            export = %self.target.export,
            protocol = %self.target.protocol,
            mounts = addresses.len(),
            "Mounting work paths"
        );

        for address in addresses {
            match self.mount_one(&address) {
                Ok(point) => self.mount_points.push(point),
                Err(e) => {
                    let workdir = env::current_dir()
                        .map(|d| d.display().to_string())
                        .unwrap_or_else(|_| "<unknown>".to_string());
                    tracing::error!(error = %e, %workdir, "Mount failed");
                    return Err(e);
                }
            }
        }

        Ok(&self.mount_points)
    }

    fn mount_one(&self, address: &str) -> Result<MountPoint, MountError> {
        let path = self.mount_point_path(address);
        fs::create_dir_all(&path).map_err(|e| MountError::MountPointUnusable {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        // Clear any stale attachment from a previous run; failure here just
        // means there was nothing mounted.
        let _ = shell::run_privileged(
            "umount",
            &["-fl", &path.display().to_string()],
            self.mount_timeout,
        );

        let source = format!("{}:{}", address, self.target.export);
        let path_str = path.display().to_string();
        let result = shell::run_privileged(
            "mount",
            &[
                "-t",
                self.target.protocol.fstype(),
                "-o",
                self.target.protocol.options(),
                &source,
                &path_str,
            ],
            self.mount_timeout,
        );

        match result {
            Ok(()) => {
                debug!(%address, path = %path.display(), "Mounted");
                Ok(MountPoint {
                    address: address.to_string(),
                    path,
                    mounted: true,
                })
            }
            Err(crate::error::ShellError::Timeout { .. }) => Err(MountError::Timeout {
                address: address.to_string(),
                secs: self.mount_timeout.as_secs(),
            }),
            Err(e) => Err(MountError::MountFailed {
                address: address.to_string(),
                export: self.target.export.clone(),
                mount_point: path,
                reason: e.to_string(),
            }),
        }
    }

    /// Detach every mount. Idempotent: never-mounted and already-unmounted
    /// points are no-ops, and a failed `umount` on a live point is logged
    /// rather than raised (`-l` makes the kernel finish lazily anyway).
    pub fn unmount_all(&mut self) {
        for point in &mut self.mount_points {
            if !point.mounted {
                continue;
            }
            let path_str = point.path.display().to_string();
            match shell::run_privileged("umount", &["-fl", &path_str], self.mount_timeout) {
                Ok(()) => debug!(path = %point.path.display(), "Unmounted"),
                Err(e) => debug!(path = %point.path.display(), error = %e, "Unmount skipped"),
            }
            point.mounted = false;
        }
    }
}

impl Drop for Mounter {
    fn drop(&mut self) {
        self.unmount_all();
    }
}

/// Create the directory under test on an already-mounted point.
pub fn create_test_dir(mount_point: &Path, test_dir: &str) -> std::io::Result<PathBuf> {
    let dir = mount_point.join(test_dir);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_with_range(start: Option<&str>, end: Option<&str>) -> MountTarget {
        MountTarget::new(
            MountType::Nfs3,
            "cluster01",
            "/vol0",
            start.map(str::to_string),
            end.map(str::to_string),
            0,
            0,
        )
    }

    #[test]
    fn test_expand_vip_range_ascending() {
        let addrs = expand_vip_range("10.0.0.1", "10.0.0.3").unwrap();
        assert_eq!(
            addrs,
            vec![
                Ipv4Addr::new(10, 0, 0, 1),
                Ipv4Addr::new(10, 0, 0, 2),
                Ipv4Addr::new(10, 0, 0, 3),
            ]
        );
    }

    #[test]
    fn test_expand_vip_range_single_address() {
        let addrs = expand_vip_range("10.0.0.7", "10.0.0.7").unwrap();
        assert_eq!(addrs.len(), 1);
    }

    #[test]
    fn test_expand_vip_range_crosses_octets() {
        let addrs = expand_vip_range("10.0.0.254", "10.0.1.1").unwrap();
        assert_eq!(addrs.len(), 4);
        assert_eq!(addrs[0], Ipv4Addr::new(10, 0, 0, 254));
        assert_eq!(addrs[3], Ipv4Addr::new(10, 0, 1, 1));
    }

    #[test]
    fn test_expand_vip_range_rejects_garbage() {
        assert!(matches!(
            expand_vip_range("not-an-ip", "10.0.0.3"),
            Err(VipRangeError::Unparsable(_))
        ));
        assert!(matches!(
            expand_vip_range("10.0.0.5", "10.0.0.1"),
            Err(VipRangeError::Reversed { .. })
        ));
    }

    #[test]
    fn test_addresses_from_valid_range() {
        let target = target_with_range(Some("10.0.0.1"), Some("10.0.0.3"));
        let addrs = target.addresses();
        assert_eq!(addrs, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn test_addresses_fall_back_on_any_malformed_range() {
        // Missing end, missing both, unparsable, reversed: all fall back
        // to exactly one bare-server address.
        for target in [
            target_with_range(Some("10.0.0.1"), None),
            target_with_range(None, None),
            target_with_range(Some("bogus"), Some("10.0.0.3")),
            target_with_range(Some("10.0.0.9"), Some("10.0.0.1")),
        ] {
            assert_eq!(target.addresses(), vec!["cluster01".to_string()]);
        }
    }

    #[test]
    fn test_mount_point_path_is_address_scoped() {
        let mounter = Mounter::new(
            target_with_range(None, None),
            "/mnt",
            Duration::from_secs(60),
        );
        assert_eq!(
            mounter.mount_point_path("10.0.0.1"),
            PathBuf::from("/mnt/vfs_stress_10_0_0_1")
        );
    }

    #[test]
    fn test_unmount_never_mounted_is_noop() {
        let mut mounter = Mounter::new(
            target_with_range(None, None),
            "/mnt",
            Duration::from_secs(60),
        );
        // No mounts were made; must not touch the system at all.
        mounter.unmount_all();
        assert!(mounter.mount_points().is_empty());
    }

    #[test]
    fn test_create_test_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = create_test_dir(tmp.path(), "test_dir").unwrap();
        assert!(dir.is_dir());
        // Idempotent on rerun
        let again = create_test_dir(tmp.path(), "test_dir").unwrap();
        assert_eq!(dir, again);
    }
}
