//! Free disk space precheck (§4.5.5 step 2).

use sysinfo::Disks;

/// Bytes of free space available on the filesystem containing `path`, or
/// `None` if no matching mount point could be found.
pub fn free_space_for(path: &std::path::Path) -> Option<u64> {
    let disks = Disks::new_with_refreshed_list();
    let mut best: Option<(&std::path::Path, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if path.starts_with(mount) {
            let is_longer = best.map(|(m, _)| mount.as_os_str().len() > m.as_os_str().len());
            if is_longer.unwrap_or(true) {
                best = Some((mount, disk.available_space()));
            }
        }
    }
    best.map(|(_, space)| space)
}
