mod helpers;
mod payees;
mod payments;
mod poller;
