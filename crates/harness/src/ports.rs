use std::net::{Ipv4Addr, TcpListener};

/// Ask the OS for a currently unused loopback TCP port.
///
/// The listener is closed before returning, so another process may in
/// principle grab the port first; tests allocate once per module and bind
/// shortly after.
pub fn free_tcp_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returned_port_is_bindable() {
        let port = free_tcp_port().unwrap();
        assert_ne!(port, 0);
        TcpListener::bind((Ipv4Addr::LOCALHOST, port)).unwrap();
    }

    #[test]
    fn held_ports_are_not_handed_out_twice() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let held_port = held.local_addr().unwrap().port();
        for _ in 0..10 {
            assert_ne!(free_tcp_port().unwrap(), held_port);
        }
    }
}
