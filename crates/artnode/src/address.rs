//! ArtAddress handling: remote reprogramming of names, subnet, port
//! addresses and merge modes. Always concludes with a solicited reply.

use tracing::debug;

use artnode_protocol::packets::{unpack_name, ArtAddress, ArtPacket};
use artnode_protocol::{
    PortCommand, ReportCode, LONG_NAME_LENGTH, LOW_NIBBLE, MAX_PORTS, PORT_STATUS_DMX_SIP,
    PORT_STATUS_DMX_TEST, PORT_STATUS_DMX_TEXT, PORT_STATUS_LPT_MODE, PROGRAM_CHANGE_MASK,
    PROGRAM_DEFAULTS, PROGRAM_NO_CHANGE, SHORT_NAME_LENGTH,
};

use crate::error::Result;
use crate::hooks::Event;
use crate::node::{truncate_name, Node, NodeType};
use crate::ports::{universe_address, MergeMode};

impl Node {
    pub(crate) fn handle_address(&mut self, address: &ArtAddress, packet: &ArtPacket) -> Result<()> {
        if self.hooks.fire(Event::Address, packet) {
            return Ok(());
        }
        // servers and raw nodes are not reprogrammable
        if matches!(self.node_type, NodeType::Server | NodeType::Raw) {
            return Ok(());
        }

        self.program_names(address);

        // remember the input addresses to detect changes afterwards
        let mut before = [0u8; MAX_PORTS];
        for (i, port) in self.ports.input.iter().enumerate() {
            before[i] = port.port.addr;
        }

        self.program_subnet(address.subnet);
        self.program_switches(address);

        for (i, port) in self.ports.input.iter_mut().enumerate() {
            if before[i] != port.port.addr {
                port.sequence = 0;
            }
        }

        self.run_port_command(address.command);

        // an ArtAddress always provokes a reply
        self.send_poll_reply_internal(true)
    }

    fn program_names(&mut self, address: &ArtAddress) {
        match address.short_name[0] {
            PROGRAM_NO_CHANGE => {}
            PROGRAM_DEFAULTS => {
                self.short_name = self.default_short_name.clone();
            }
            _ => {
                self.short_name =
                    truncate_name(&unpack_name(&address.short_name), SHORT_NAME_LENGTH);
                self.report_code = ReportCode::ShNameOk;
            }
        }
        match address.long_name[0] {
            PROGRAM_NO_CHANGE => {}
            PROGRAM_DEFAULTS => {
                self.long_name = self.default_long_name.clone();
            }
            _ => {
                self.long_name = truncate_name(&unpack_name(&address.long_name), LONG_NAME_LENGTH);
                self.report_code = ReportCode::LoNameOk;
            }
        }
    }

    fn program_subnet(&mut self, value: u8) {
        let old_subnet = self.subnet;
        if value == PROGRAM_DEFAULTS {
            self.subnet = self.default_subnet;
            self.subnet_net_ctl = false;
        } else if value & PROGRAM_CHANGE_MASK != 0 {
            self.subnet = value & !PROGRAM_CHANGE_MASK & LOW_NIBBLE;
            self.subnet_net_ctl = true;
        }
        // anything else is a no-op

        if old_subnet != self.subnet {
            let subnet = self.subnet;
            for port in &mut self.ports.input {
                port.port.addr = universe_address(subnet, port.port.addr);
            }
            for port in &mut self.ports.output {
                port.port.addr = universe_address(subnet, port.port.addr);
            }
            debug!(subnet, "subnet reprogrammed");
        }
    }

    fn program_switches(&mut self, address: &ArtAddress) {
        let subnet = self.subnet;
        for i in 0..MAX_PORTS {
            let value = address.sw_in[i];
            let port = &mut self.ports.input[i];
            if value == PROGRAM_NO_CHANGE {
                continue;
            } else if value == PROGRAM_DEFAULTS {
                port.port.addr = universe_address(subnet, port.port.default_addr);
                port.port.net_ctl = false;
            } else if value & PROGRAM_CHANGE_MASK != 0 {
                port.port.addr = universe_address(subnet, value & !PROGRAM_CHANGE_MASK);
                port.port.net_ctl = true;
            }
        }
        for i in 0..MAX_PORTS {
            let value = address.sw_out[i];
            let port = &mut self.ports.output[i];
            if value == PROGRAM_NO_CHANGE {
                continue;
            } else if value == PROGRAM_DEFAULTS {
                port.port.addr = universe_address(subnet, port.port.default_addr);
                port.port.net_ctl = false;
                port.enabled = true;
            } else if value & PROGRAM_CHANGE_MASK != 0 {
                port.port.addr = universe_address(subnet, value & !PROGRAM_CHANGE_MASK);
                port.port.net_ctl = true;
                port.enabled = true;
            }
        }
    }

    fn run_port_command(&mut self, command: u8) {
        match PortCommand::from_u8(command) {
            Some(PortCommand::None) => {}
            Some(PortCommand::Cancel) => {
                // TODO: cancel an in-progress merge instead of waiting
                // for the source timeout
            }
            Some(PortCommand::Reset) => {
                self.ports.output[0].status &=
                    !(PORT_STATUS_DMX_SIP | PORT_STATUS_DMX_TEST | PORT_STATUS_DMX_TEXT);
            }
            Some(
                cmd @ (PortCommand::MergeLtp0
                | PortCommand::MergeLtp1
                | PortCommand::MergeLtp2
                | PortCommand::MergeLtp3),
            ) => {
                let port = &mut self.ports.output[cmd as usize - PortCommand::MergeLtp0 as usize];
                port.merge_mode = MergeMode::Ltp;
                port.status |= PORT_STATUS_LPT_MODE;
            }
            Some(
                cmd @ (PortCommand::MergeHtp0
                | PortCommand::MergeHtp1
                | PortCommand::MergeHtp2
                | PortCommand::MergeHtp3),
            ) => {
                let port = &mut self.ports.output[cmd as usize - PortCommand::MergeHtp0 as usize];
                port.merge_mode = MergeMode::Htp;
                port.status &= !PORT_STATUS_LPT_MODE;
            }
            _ => {}
        }
    }
}
