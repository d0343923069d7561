//! Pre-built scenarios describing a typical storage server.
//!
//! The filesystem and runner halves are built separately but describe the
//! same host: one running and one stopped VM, two containers, one ZFS pool,
//! three user shares and a few notifications.

use super::filesystem::MockFs;
use super::runner::MockRunner;

/// Run by the docker collector.
const DOCKER_PS: &str = "docker ps -a --no-trunc --format {{json .}}";
const DOCKER_STATS: &str = "docker stats --no-stream --no-trunc --format {{json .}}";
const ZPOOL_LIST: &str = "zpool list -Hp -o name,size,alloc,free,frag,cap,dedup,health";

impl MockFs {
    /// Host files of the storage server scenario.
    pub fn storage_server() -> Self {
        let fs = Self::new();

        fs.add_file("/proc/sys/kernel/hostname", "tower\n");
        fs.add_file("/proc/uptime", "12345.67 98765.43\n");
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
SwapTotal:             0 kB
SwapFree:              0 kB
",
        );
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
cpu3 2500 125 750 20000 250 50 25 0 0 0
ctxt 500000
btime 1700000000
",
        );

        // QEMU process backing "Windows 11"
        fs.add_process(4321, "qemu-system-x86", 2500, 700);

        // User shares
        fs.add_file(
            "/var/local/emhttp/shares.ini",
            "\
[shareName=\"appdata\"]
name=\"appdata\"
size=\"0\"
free=\"400000000000\"
used=\"100000000000\"
[shareName=\"media\"]
name=\"media\"
size=\"8000000000000\"
free=\"2000000000000\"
used=\"6000000000000\"
[shareName=\"isos\"]
name=\"isos\"
free=\"900000000000\"
used=\"50000000000\"
",
        );
        fs.add_file(
            "/boot/config/shares/appdata.cfg",
            "\
# Generated settings:
shareComment=\"Application data\"
shareUseCache=\"only\"
shareExport=\"-e\"
shareSecurity=\"public\"
",
        );
        fs.add_file(
            "/boot/config/shares/media.cfg",
            "\
shareComment=\"\"
shareUseCache=\"yes\"
shareExport=\"-n\"
shareSecurity=\"\"
",
        );

        // ZFS
        fs.add_file(
            "/proc/spl/kstat/zfs/arcstats",
            "\
13 1 0x01 123 33456 4819219802 3452823541280
name                            type data
hits                            4    900
misses                          4    100
mru_hits                        4    300
mfu_hits                        4    600
size                            4    4294967296
c                               4    8589934592
c_min                           4    1073741824
c_max                           4    8589934592
l2_size                         4    0
l2_hits                         4    0
l2_misses                       4    0
",
        );
        fs.add_file(
            "/proc/spl/kstat/zfs/tank/io",
            "\
12 3 0x00 1 80 2280987431 18342837543891
nread    nwritten reads    writes   wtime    wlentime wupdate  rtime    rlentime rupdate  wcnt     rcnt
1048576  2097152  100      200      0        0        0        0        0        0        0        0
",
        );

        // Notifications, newest unread first
        fs.add_file(
            "/tmp/notifications/unread/20241118-120000-disk_hot.notify",
            "\
timestamp=1731931200
event=Array
subject=Warning [TOWER] - Disk 3 is hot (55 C)
description=WDC_WD80EFAX (sdd)
importance=alert
link=/Main
",
        );
        fs.add_file(
            "/tmp/notifications/unread/20241118-030000-parity.notify",
            "\
timestamp=1731898800
event=Parity check
subject=Notice [TOWER] - Parity check finished (0 errors)
description=Duration: 14 hours, 2 minutes
importance=normal
",
        );
        fs.add_file(
            "/tmp/notifications/archive/20231114-221320-update.notify",
            "\
timestamp=1700000000
event=Plugin update
subject=Update available
importance=warning
",
        );

        fs
    }
}

impl MockRunner {
    /// Tool output of the storage server scenario.
    pub fn storage_server() -> Self {
        let runner = Self::new();

        // libvirt
        runner.set_output("virsh list --all --name", "Windows 11\nubuntu\n\n");
        runner.set_output("virsh domstate Windows 11", "running\n");
        runner.set_output("virsh domstate ubuntu", "shut off\n");
        runner.set_output(
            "virsh domuuid Windows 11",
            "4f2a9c1e-0000-4000-8000-000000000001\n",
        );
        runner.set_failure("virsh domuuid ubuntu", 1, "error: failed to get domain uuid");
        runner.set_output(
            "virsh dominfo Windows 11",
            "\
Id:             1
Name:           Windows 11
UUID:           4f2a9c1e-0000-4000-8000-000000000001
OS Type:        hvm
State:          running
CPU(s):         4
CPU time:       100.0s
Max memory:     8388608 KiB
Used memory:    8388608 KiB
Persistent:     yes
Autostart:      enable
",
        );
        runner.set_output(
            "virsh dominfo ubuntu",
            "\
Id:             -
Name:           ubuntu
State:          shut off
CPU(s):         2
Max memory:     2097152 KiB
Used memory:    2097152 KiB
Persistent:     yes
Autostart:      disable
",
        );
        runner.set_output(
            "virsh dommemstat Windows 11",
            "actual 4194304\nswap_in 0\nunused 1048576\nrss 4300000\n",
        );
        runner.set_output(
            "virsh domstats Windows 11 --cpu-total",
            "Domain: 'Windows 11'\n  cpu.time=100000000000\n  cpu.user=60000000000\n",
        );
        runner.set_output("pgrep -f qemu.*guest=Windows 11", "4321\n");
        runner.set_output(
            "virsh domblklist Windows 11",
            "\
 Target   Source
------------------------------------------------
 vda      /mnt/user/domains/Windows 11/vdisk1.img
 vdb      /mnt/user/domains/Windows 11/vdisk2.img
 hdc      -
",
        );
        runner.set_output(
            "virsh domblkstat Windows 11 vda",
            "vda rd_req 10\nvda rd_bytes 4096\nvda wr_req 4\nvda wr_bytes 2048\n",
        );
        runner.set_output(
            "virsh domblkstat Windows 11 vdb",
            "vdb rd_req 2\nvdb rd_bytes 1000\nvdb wr_req 1\nvdb wr_bytes 500\n",
        );
        runner.set_output(
            "virsh domiflist Windows 11",
            "\
 Interface   Type     Source   Model    MAC
-------------------------------------------------------------
 vnet0       bridge   br0      virtio   52:54:00:aa:bb:cc
",
        );
        runner.set_output(
            "virsh domifstat Windows 11 vnet0",
            "vnet0 rx_bytes 10000\nvnet0 rx_packets 80\nvnet0 tx_bytes 20000\nvnet0 tx_packets 90\n",
        );

        // docker
        runner.set_output(
            DOCKER_PS,
            concat!(
                r#"{"ID":"a1b2c3","Names":"plex","Image":"plexinc/pms-docker","State":"running","Status":"Up 3 days","Networks":"host","Ports":""}"#,
                "\n",
                r#"{"ID":"d4e5f6","Names":"db","Image":"postgres:16","State":"exited","Status":"Exited (0) 2 hours ago","Networks":"bridge","Ports":"5432/tcp"}"#,
                "\n",
            ),
        );
        runner.set_output(
            DOCKER_STATS,
            concat!(
                r#"{"ID":"a1b2c3","Name":"plex","CPUPerc":"1.50%","MemUsage":"512MiB / 16GiB","NetIO":"1.2MB / 3.4MB"}"#,
                "\n",
            ),
        );

        // zfs
        runner.set_output(
            ZPOOL_LIST,
            "tank\t8001563222016\t3200625288806\t4800937933210\t12\t40\t1.00x\tONLINE\n",
        );

        // lm-sensors
        runner.set_output(
            "sensors -u",
            "\
coretemp-isa-0000
Adapter: ISA adapter
Package id 0:
  temp1_input: 51.000
  temp1_max: 80.000
Core 0:
  temp2_input: 48.000

nct6775-isa-0290
Adapter: ISA adapter
fan1:
  fan1_input: 1200.000
fan2:
  fan2_input: 900.000
MB Temp:
  temp1_input: 36.500
",
        );

        runner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::traits::{CommandRunner, FileSystem};
    use std::path::Path;

    #[test]
    fn test_storage_server_fs() {
        let fs = MockFs::storage_server();
        assert!(fs.exists(Path::new("/proc/meminfo")));
        assert!(fs.exists(Path::new("/tmp/notifications/archive")));
        assert_eq!(fs.read_dir(Path::new("/tmp/notifications/unread")).unwrap().len(), 2);
    }

    #[test]
    fn test_storage_server_runner() {
        let runner = MockRunner::storage_server();
        for program in ["virsh", "docker", "zpool", "sensors", "pgrep"] {
            assert!(runner.exists(program), "{program}");
        }
        assert!(runner.output("virsh", &["domuuid", "ubuntu"]).is_err());
    }
}
